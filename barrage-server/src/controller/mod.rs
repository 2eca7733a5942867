//! Controller runtime
//!
//! Keeps the registry of worker URLs, probes their liveness before every
//! fan-out, splits master plans across them and publishes fleet gauges.

pub mod routes;
pub mod transport;

use crate::ServerError;
use barrage_core::TestPlan;
use barrage_generators::TestTypeRegistry;
use barrage_metrics::MetricsSink;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use transport::WorkerTransport;

/// Controller bootstrap options.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub port: u16,
    /// Target URL handed to workers at registration.
    pub target_url: String,
    /// Statsd address handed to workers at registration (and used locally).
    pub statsd_server_url: Option<String>,
}

/// Shared controller state behind the HTTP surface.
pub struct ControllerState {
    /// Registered worker URLs, insertion-ordered, unique.
    workers: Mutex<Vec<String>>,
    /// Rate requested by the last command, for the `desired-req-sec` gauge.
    desired_rate: Mutex<f64>,
    transport: Arc<dyn WorkerTransport>,
    registry: Arc<TestTypeRegistry>,
    sink: Arc<dyn MetricsSink>,
    options: ControllerOptions,
}

impl ControllerState {
    pub fn new(
        options: ControllerOptions,
        registry: Arc<TestTypeRegistry>,
        transport: Arc<dyn WorkerTransport>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            workers: Mutex::new(Vec::new()),
            desired_rate: Mutex::new(0.0),
            transport,
            registry,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Register a worker URL; duplicates are idempotent.
    pub fn add_worker(&self, url: &str) {
        let mut workers = self.workers.lock().expect("worker registry poisoned");
        if workers.iter().any(|worker| worker == url) {
            return;
        }
        info!(url, "registered worker");
        workers.push(url.to_string());
    }

    pub fn remove_worker(&self, url: &str) {
        let mut workers = self.workers.lock().expect("worker registry poisoned");
        if let Some(idx) = workers.iter().position(|worker| worker == url) {
            workers.swap_remove(idx);
            info!(url, "removed worker");
        }
    }

    /// Snapshot of the registered workers; the lock is released before any
    /// I/O happens against them.
    pub fn workers(&self) -> Vec<String> {
        self.workers.lock().expect("worker registry poisoned").clone()
    }

    pub fn set_desired_rate(&self, rate: f64) {
        *self.desired_rate.lock().expect("rate gauge poisoned") = rate;
    }

    pub fn desired_rate(&self) -> f64 {
        *self.desired_rate.lock().expect("rate gauge poisoned")
    }

    /// Probe every worker's ping endpoint and drop the unreachable ones.
    pub async fn check_workers(&self) {
        let workers = self.workers();
        if workers.is_empty() {
            return;
        }
        let mut probes = JoinSet::new();
        for url in workers {
            let transport = Arc::clone(&self.transport);
            probes.spawn(async move { (transport.ping(&url).await, url) });
        }
        while let Some(result) = probes.join_next().await {
            if let Ok((Err(err), url)) = result {
                warn!(url = %url, %err, "worker failed liveness probe, removing");
                self.remove_worker(&url);
            }
        }
    }

    /// Split the plan across the live workers and post the sub-plans,
    /// fire-and-forget.
    pub async fn forward_attack(self: Arc<Self>, plan: TestPlan) {
        self.check_workers().await;
        let workers = self.workers();
        if workers.is_empty() {
            error!("cannot forward attack, no workers registered");
            return;
        }

        let splitter = self.registry.splitter(&plan.test_type);
        let plans = match splitter(&plan, workers.len()) {
            Ok(plans) => plans,
            Err(err) => {
                error!(%err, test_type = %plan.test_type, "could not split plan");
                return;
            }
        };

        for (url, sub_plan) in workers.into_iter().zip(plans) {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(err) = transport.send_plan(&url, &sub_plan).await {
                    error!(url = %url, %err, "error sending command to worker");
                }
            });
        }
    }

    /// Broadcast a stop to every known worker.
    pub fn forward_stop(&self) {
        for url in self.workers() {
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(err) = transport.send_stop(&url).await {
                    error!(url = %url, %err, "could not send stop to worker");
                }
            });
        }
    }

    fn worker_count(&self) -> usize {
        self.workers.lock().expect("worker registry poisoned").len()
    }
}

/// Publish `registered-workers` and `desired-req-sec` every second.
pub fn spawn_gauge_loop(state: Arc<ControllerState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            state
                .sink
                .gauge("registered-workers", state.worker_count() as f64, &[]);
            state.sink.gauge("desired-req-sec", state.desired_rate(), &[]);
        }
    })
}

/// Bind the controller HTTP surface and serve until shutdown.
pub async fn run_controller(options: ControllerOptions) -> Result<(), ServerError> {
    let sink = barrage_metrics::statsd_sink(options.statsd_server_url.as_deref());
    let registry = Arc::new(barrage_generators::builtin_registry());
    let transport = Arc::new(transport::HttpWorkerTransport::new()?);
    let port = options.port;
    let state = Arc::new(ControllerState::new(options, registry, transport, sink));

    spawn_gauge_loop(Arc::clone(&state));

    let app = routes::controller_routes(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "controller listening");
    axum::serve(listener, app).await?;
    Ok(())
}
