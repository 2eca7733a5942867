//! Controller HTTP surface

use super::ControllerState;
use crate::wire::{error_json, ok_json, RegisterWorkerRequest, RegisterWorkerResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use barrage_core::TestPlan;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Build the controller router. Control endpoints accept both the bare and
/// the trailing-slash spelling.
pub fn controller_routes(state: Arc<ControllerState>) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/register/", post(register))
        .route("/unregister", post(unregister))
        .route("/unregister/", post(unregister))
        .route("/command", post(command))
        .route("/command/", post(command))
        .route("/stop", get(stop).post(stop))
        .route("/stop/", get(stop).post(stop))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register(
    State(state): State<Arc<ControllerState>>,
    body: Result<Json<RegisterWorkerRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => {
            state.add_worker(&request.worker_url);
            let options = state.options();
            (
                StatusCode::OK,
                Json(serde_json::to_value(RegisterWorkerResponse::ok(
                    &options.target_url,
                    options.statsd_server_url.as_deref(),
                ))
                .unwrap_or_else(|_| ok_json())),
            )
        }
        Err(err) => {
            error!(%err, "error while trying to register worker");
            (
                StatusCode::BAD_REQUEST,
                Json(error_json("could not parse registration request")),
            )
        }
    }
}

async fn unregister(
    State(state): State<Arc<ControllerState>>,
    body: Result<Json<RegisterWorkerRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    match body {
        Ok(Json(request)) => {
            state.remove_worker(&request.worker_url);
            (StatusCode::OK, Json(ok_json()))
        }
        Err(err) => {
            error!(%err, "error while trying to unregister worker");
            (
                StatusCode::BAD_REQUEST,
                Json(error_json("could not parse unregistration request")),
            )
        }
    }
}

async fn command(
    State(state): State<Arc<ControllerState>>,
    body: Result<Json<TestPlan>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    info!("command handler called");
    let plan = match body {
        Ok(Json(plan)) => plan,
        Err(err) => {
            error!(%err, "could not parse command");
            return (StatusCode::BAD_REQUEST, "Could not parse command");
        }
    };
    if let Err(err) = plan.validate() {
        error!(%err, "rejected command");
        return (StatusCode::BAD_REQUEST, "Could not parse command");
    }

    if let Some(rate) = plan.requests_per_second() {
        state.set_desired_rate(rate);
    }

    // fan-out happens in the background, the operator gets the ack now
    tokio::spawn(Arc::clone(&state).forward_attack(plan));
    (StatusCode::OK, "Attack forwarded to workers")
}

async fn stop(State(state): State<Arc<ControllerState>>) -> impl IntoResponse {
    info!("stop handler called");
    state.set_desired_rate(0.0);
    state.forward_stop();
    (StatusCode::OK, Json(ok_json()))
}
