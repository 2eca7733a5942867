//! Full control-plane loop over real sockets: operator -> controller ->
//! worker -> target.

use axum::routing::post;
use axum::Router;
use barrage_metrics::NullSink;
use barrage_server::controller::routes::controller_routes;
use barrage_server::controller::transport::HttpWorkerTransport;
use barrage_server::controller::{ControllerOptions, ControllerState};
use barrage_server::worker::routes::{worker_routes, WorkerHandle};
use barrage_server::worker::runtime::AttackRuntime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_target(hits: Arc<AtomicU64>) -> String {
    let app = Router::new().route(
        "/api/:project_id/envelope/",
        post(move || {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "ok"
            }
        }),
    );
    serve(app).await
}

async fn spawn_worker(target_url: String) -> String {
    let (plan_tx, plan_rx) = mpsc::unbounded_channel();
    let runtime = AttackRuntime::new(
        target_url,
        Arc::new(barrage_generators::builtin_registry()),
        Arc::new(NullSink),
    );
    tokio::spawn(runtime.run(plan_rx));
    serve(worker_routes(WorkerHandle::new(plan_tx))).await
}

async fn spawn_controller(target_url: &str) -> (String, Arc<ControllerState>) {
    let state = Arc::new(ControllerState::new(
        ControllerOptions {
            port: 0,
            target_url: target_url.to_string(),
            statsd_server_url: None,
        },
        Arc::new(barrage_generators::builtin_registry()),
        Arc::new(HttpWorkerTransport::new().unwrap()),
        Arc::new(NullSink),
    ));
    let url = serve(controller_routes(Arc::clone(&state))).await;
    (url, state)
}

#[tokio::test]
async fn command_flows_from_operator_to_target() {
    let hits = Arc::new(AtomicU64::new(0));
    let target_url = spawn_target(Arc::clone(&hits)).await;
    let worker_url = spawn_worker(target_url.clone()).await;
    let (controller_url, state) = spawn_controller(&target_url).await;

    let operator = reqwest::Client::new();

    // register the worker the way a worker process would
    let response = operator
        .post(format!("{controller_url}/register/"))
        .json(&serde_json::json!({"workerUrl": worker_url}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["params"]["targetUrl"], target_url);
    assert_eq!(state.workers(), vec![worker_url.clone()]);

    // operator posts a plan; the controller probes, splits and forwards it
    let response = operator
        .post(format!("{controller_url}/command/"))
        .json(&serde_json::json!({
            "name": "e2e",
            "testType": "session",
            "attackDuration": "1h",
            "numMessages": 40,
            "per": "1s"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "Attack forwarded to workers");

    // the worker must be attacking the target shortly after
    let mut waited = Duration::ZERO;
    while hits.load(Ordering::SeqCst) == 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    assert!(hits.load(Ordering::SeqCst) > 0, "target never saw traffic");

    // stop fan-out ends the attack
    let response = operator
        .get(format!("{controller_url}/stop/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    tokio::time::sleep(Duration::from_millis(700)).await;
    let after_stop = hits.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        hits.load(Ordering::SeqCst),
        after_stop,
        "traffic continued after stop"
    );

    // the worker stays live and unregisters cleanly
    let response = operator
        .get(format!("{worker_url}/ping/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = operator
        .post(format!("{controller_url}/unregister/"))
        .json(&serde_json::json!({"workerUrl": worker_url}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(state.workers().is_empty());
}

#[tokio::test]
async fn dead_workers_are_dropped_at_command_time() {
    let hits = Arc::new(AtomicU64::new(0));
    let target_url = spawn_target(Arc::clone(&hits)).await;
    let worker_url = spawn_worker(target_url.clone()).await;
    let (controller_url, state) = spawn_controller(&target_url).await;

    let operator = reqwest::Client::new();
    for url in [worker_url.as_str(), "http://127.0.0.1:9"] {
        operator
            .post(format!("{controller_url}/register/"))
            .json(&serde_json::json!({"workerUrl": url}))
            .send()
            .await
            .unwrap();
    }
    assert_eq!(state.workers().len(), 2);

    operator
        .post(format!("{controller_url}/command/"))
        .json(&serde_json::json!({
            "testType": "session",
            "attackDuration": "2s",
            "numMessages": 10,
            "per": "1s"
        }))
        .send()
        .await
        .unwrap();

    let mut waited = Duration::ZERO;
    while state.workers().len() > 1 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    assert_eq!(state.workers(), vec![worker_url]);
}
