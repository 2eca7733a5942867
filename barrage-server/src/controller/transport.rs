//! Controller-to-worker transport

use barrage_core::TestPlan;
use barrage_http::{control_client, HttpError};
use tracing::debug;

/// Control calls from the controller to one worker. Abstracted so the
/// fan-out logic can be exercised without sockets.
#[async_trait::async_trait]
pub trait WorkerTransport: Send + Sync {
    async fn ping(&self, worker_url: &str) -> Result<(), HttpError>;
    async fn send_plan(&self, worker_url: &str, plan: &TestPlan) -> Result<(), HttpError>;
    async fn send_stop(&self, worker_url: &str) -> Result<(), HttpError>;
}

/// The real transport: JSON over HTTP with a 1 s budget per call.
pub struct HttpWorkerTransport {
    client: reqwest::Client,
}

impl HttpWorkerTransport {
    pub fn new() -> Result<Self, HttpError> {
        Ok(Self {
            client: control_client()?,
        })
    }

    fn endpoint(worker_url: &str, path: &str) -> String {
        format!("{}/{path}/", worker_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl WorkerTransport for HttpWorkerTransport {
    async fn ping(&self, worker_url: &str) -> Result<(), HttpError> {
        let response = self
            .client
            .get(Self::endpoint(worker_url, "ping"))
            .send()
            .await?;
        let status = response.status();
        if status.as_u16() > 300 {
            return Err(HttpError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn send_plan(&self, worker_url: &str, plan: &TestPlan) -> Result<(), HttpError> {
        debug!(worker_url, "sending command");
        let response = self
            .client
            .post(Self::endpoint(worker_url, "command"))
            .json(plan)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn send_stop(&self, worker_url: &str) -> Result<(), HttpError> {
        let response = self
            .client
            .get(Self::endpoint(worker_url, "stop"))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        Ok(())
    }
}
