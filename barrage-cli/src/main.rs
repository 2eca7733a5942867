//! The barrage binary: bootstrap and role dispatch

mod cli;
mod config;

use anyhow::Context;
use barrage_providers::ProjectProvider;
use barrage_server::controller::{run_controller, ControllerOptions};
use barrage_server::worker::{run_worker, WorkerOptions};
use clap::Parser;
use cli::{Cli, Commands, RunCommands};
use config::BarrageConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 8000;

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn install_project_provider(config_dir: &std::path::Path) -> anyhow::Result<()> {
    if let Some(path) = config::projects_file(config_dir) {
        let provider = ProjectProvider::from_file(&path)
            .with_context(|| format!("could not load projects from {}", path.display()))?;
        info!(count = provider.number_of_projects(), "installed file-backed project provider");
        barrage_providers::install(provider)
            .map_err(|err| anyhow::anyhow!("provider already installed: {err}"))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    let config = BarrageConfig::load(&cli.config_dir)?;
    install_project_provider(&cli.config_dir)?;

    match cli.command {
        Commands::Run { role } => match role {
            RunCommands::Controller {
                port,
                target_url,
                statsd_server_url,
            } => {
                let options = ControllerOptions {
                    port: port.or(config.port).unwrap_or(DEFAULT_PORT),
                    target_url: target_url
                        .or(config.target_url)
                        .unwrap_or_default(),
                    statsd_server_url: statsd_server_url.or(config.statsd_server_url),
                };
                run_controller(options).await.context("controller failed")?;
            }
            RunCommands::Worker {
                port,
                target_url,
                controller_url,
                statsd_server_url,
                worker_url,
            } => {
                let target_url = target_url
                    .or(config.target_url)
                    .context("a worker needs a target url (flag, config or BARRAGE_TARGET_URL)")?;
                let options = WorkerOptions {
                    port: port.or(config.port).unwrap_or(DEFAULT_PORT),
                    target_url,
                    controller_url: controller_url.or(config.controller_url),
                    statsd_server_url: statsd_server_url.or(config.statsd_server_url),
                    worker_url: worker_url.or(config.worker_url),
                };
                run_worker(options).await.context("worker failed")?;
            }
        },
    }
    Ok(())
}
