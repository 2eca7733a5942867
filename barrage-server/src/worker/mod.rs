//! Worker runtime
//!
//! A worker serves the control surface, registers itself with the
//! controller when one is configured, and runs at most one attack at a
//! time.

pub mod registration;
pub mod routes;
pub mod runtime;

use crate::ServerError;
use barrage_metrics::external_ipv4;
use routes::WorkerHandle;
use runtime::AttackRuntime;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Worker bootstrap options.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub port: u16,
    /// Base URL of the load-test target.
    pub target_url: String,
    /// Controller to register with; absent means independent mode.
    pub controller_url: Option<String>,
    pub statsd_server_url: Option<String>,
    /// URL under which the controller can reach this worker; derived from
    /// the outbound IPv4 address when absent.
    pub worker_url: Option<String>,
}

fn advertised_url(options: &WorkerOptions) -> Option<String> {
    if let Some(url) = &options.worker_url {
        return Some(url.clone());
    }
    match external_ipv4() {
        Ok(ip) => Some(format!("http://{ip}:{}", options.port)),
        Err(err) => {
            warn!(%err, "could not determine the worker address, skipping registration");
            None
        }
    }
}

/// Bind the worker HTTP surface, register with the controller and serve
/// until shutdown.
///
/// The control surface goes live before registration so the liveness
/// endpoint answers from the moment the process is up; plans posted while
/// registration is still retrying queue up losslessly on the control
/// channel.
pub async fn run_worker(mut options: WorkerOptions) -> Result<(), ServerError> {
    let (plan_tx, plan_rx) = mpsc::unbounded_channel();
    let app = routes::worker_routes(WorkerHandle::new(plan_tx));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", options.port)).await?;
    info!(port = options.port, "worker listening");
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    if let Some(controller_url) = options.controller_url.clone() {
        if let Some(worker_url) = advertised_url(&options) {
            match registration::register_with_controller(&controller_url, &worker_url).await {
                Ok(overrides) => {
                    // controller-provided parameters win over local ones
                    if let Some(target_url) = overrides.target_url.filter(|u| !u.is_empty()) {
                        options.target_url = target_url;
                    }
                    if let Some(statsd) = overrides.statsd_server_url.filter(|u| !u.is_empty()) {
                        options.statsd_server_url = Some(statsd);
                    }
                }
                Err(err) => {
                    warn!(%err, "registration failed, continuing unregistered");
                }
            }
        }
    } else {
        info!("no controller url specified, running in independent mode");
    }

    let sink = barrage_metrics::statsd_sink(options.statsd_server_url.as_deref());
    let registry = Arc::new(barrage_generators::builtin_registry());
    let runtime = AttackRuntime::new(options.target_url.clone(), registry, sink);
    info!(target_url = %options.target_url, "attack runtime started");
    tokio::spawn(runtime.run(plan_rx));

    server.await??;
    Ok(())
}
