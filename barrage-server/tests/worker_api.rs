//! Worker HTTP surface tests

use axum::body::Body;
use axum::http::{Request, StatusCode};
use barrage_core::TestPlan;
use barrage_server::worker::routes::{worker_routes, WorkerHandle};
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::sync::mpsc;

fn worker() -> (axum::Router, mpsc::UnboundedReceiver<TestPlan>) {
    let (plan_tx, plan_rx) = mpsc::unbounded_channel();
    (worker_routes(WorkerHandle::new(plan_tx)), plan_rx)
}

async fn send(
    app: axum::Router,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(path);
    let body = match body {
        Some(raw) => {
            builder = builder.header("content-type", "application/json");
            Body::from(raw.to_string())
        }
        None => Body::empty(),
    };
    let response = tower::ServiceExt::oneshot(app, builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn ping_always_answers_ok() {
    for (method, path) in [
        ("GET", "/ping"),
        ("GET", "/ping/"),
        ("POST", "/ping"),
        ("POST", "/ping/"),
    ] {
        let (app, _rx) = worker();
        let (status, body) = send(app, method, path, None).await;
        assert_eq!(status, StatusCode::OK, "{method} {path}");
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "ok");
    }
}

#[tokio::test]
async fn command_queues_the_plan() {
    let (app, mut rx) = worker();
    let plan = r#"{
        "name": "noop",
        "testType": "session",
        "attackDuration": "10s",
        "numMessages": 5,
        "per": "1s"
    }"#;
    let (status, ack) = send(app, "POST", "/command/", Some(plan)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, "Command Accepted");

    let received = rx.recv().await.expect("plan was not queued");
    assert_eq!(received.test_type, "session");
    assert_eq!(received.num_messages, 5);
    assert_eq!(received.attack_duration, Duration::from_secs(10));
}

#[tokio::test]
async fn command_rejects_bad_bodies() {
    let (app, mut rx) = worker();
    let (status, body) = send(app, "POST", "/command/", Some("nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Could not parse body");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn stop_is_a_zero_duration_plan() {
    let (app, mut rx) = worker();
    let (status, ack) = send(app, "GET", "/stop/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, "Stopping requested");

    let received = rx.recv().await.expect("stop was not queued");
    assert!(received.is_stop());
}
