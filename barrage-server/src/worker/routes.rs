//! Worker HTTP surface

use crate::wire::ok_json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use barrage_core::TestPlan;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// HTTP handlers are pure producers on the control channel; the attack
/// runtime is the only consumer.
#[derive(Clone)]
pub struct WorkerHandle {
    plan_tx: mpsc::UnboundedSender<TestPlan>,
}

impl WorkerHandle {
    pub fn new(plan_tx: mpsc::UnboundedSender<TestPlan>) -> Self {
        Self { plan_tx }
    }

    fn post_plan(&self, plan: TestPlan) -> bool {
        self.plan_tx.send(plan).is_ok()
    }
}

/// Build the worker router. Control endpoints accept both the bare and the
/// trailing-slash spelling.
pub fn worker_routes(handle: WorkerHandle) -> Router {
    Router::new()
        .route("/ping", get(ping).post(ping))
        .route("/ping/", get(ping).post(ping))
        .route("/command", post(command))
        .route("/command/", post(command))
        .route("/stop", get(stop).post(stop))
        .route("/stop/", get(stop).post(stop))
        .layer(TraceLayer::new_for_http())
        .with_state(handle)
}

/// Liveness: ok whenever the process is up, attack or not.
async fn ping() -> impl IntoResponse {
    (StatusCode::OK, Json(ok_json()))
}

async fn command(
    State(handle): State<WorkerHandle>,
    body: Result<Json<TestPlan>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let plan = match body {
        Ok(Json(plan)) => plan,
        Err(err) => {
            error!(%err, "could not parse command body");
            return (StatusCode::BAD_REQUEST, "Could not parse body");
        }
    };
    if plan.validate().is_err() || !handle.post_plan(plan) {
        return (StatusCode::BAD_REQUEST, "Could not parse body");
    }
    (StatusCode::OK, "Command Accepted")
}

/// Stop is a zero-duration plan on the same channel.
async fn stop(State(handle): State<WorkerHandle>) -> impl IntoResponse {
    handle.post_plan(TestPlan::default());
    (StatusCode::OK, "Stopping requested")
}
