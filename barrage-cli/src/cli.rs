//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "barrage",
    version,
    about = "Distributed load generator for telemetry ingestion backends"
)]
pub struct Cli {
    /// Configuration directory (config.yaml, optional projects.json)
    #[arg(long, value_name = "PATH", default_value = ".config", global = true)]
    pub config_dir: PathBuf,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the load tester as a controller or a worker
    Run {
        #[command(subcommand)]
        role: RunCommands,
    },
}

#[derive(Subcommand)]
pub enum RunCommands {
    /// Accept plans from operators and fan them out to workers
    Controller {
        /// Port to listen on
        #[arg(long, short = 'p', value_name = "PORT")]
        port: Option<u16>,

        /// Target URL handed to registering workers
        #[arg(long, value_name = "URL")]
        target_url: Option<String>,

        /// Statsd server address
        #[arg(long, value_name = "ADDR")]
        statsd_server_url: Option<String>,
    },

    /// Wait for plans and drive attacks against the target
    Worker {
        /// Port to listen on
        #[arg(long, short = 'p', value_name = "PORT")]
        port: Option<u16>,

        /// Base URL of the load-test target
        #[arg(long, value_name = "URL")]
        target_url: Option<String>,

        /// Controller to register with; omit to run independently
        #[arg(long, value_name = "URL")]
        controller_url: Option<String>,

        /// Statsd server address
        #[arg(long, value_name = "ADDR")]
        statsd_server_url: Option<String>,

        /// URL the controller should use to reach this worker
        #[arg(long, value_name = "URL")]
        worker_url: Option<String>,
    },
}
