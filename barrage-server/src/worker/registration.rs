//! Worker registration with the controller

use crate::backoff::ExponentialBackoff;
use crate::wire::{ConfigParams, RegisterWorkerRequest, RegisterWorkerResponse};
use barrage_http::{registration_client, HttpError};
use std::time::Duration;
use tracing::{info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const BACKOFF_FACTOR: f64 = 1.4;

/// Register this worker with the controller, retrying 5xx and network
/// errors with exponential backoff.
///
/// A 2xx response may carry configuration overrides which the caller must
/// apply over its local configuration; 3xx/4xx are terminal since retrying
/// a rejected registration cannot succeed.
pub async fn register_with_controller(
    controller_url: &str,
    worker_url: &str,
) -> Result<ConfigParams, HttpError> {
    let client = registration_client()?;
    let registration_url = format!("{}/register/", controller_url.trim_end_matches('/'));
    let request = RegisterWorkerRequest {
        worker_url: worker_url.to_string(),
    };
    info!(url = %registration_url, worker_url, "trying to register with controller");

    let mut backoff = ExponentialBackoff::new(INITIAL_BACKOFF, MAX_BACKOFF, BACKOFF_FACTOR);
    loop {
        match client.post(&registration_url).json(&request).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if (200..300).contains(&status) {
                    info!("registration successful");
                    let body: RegisterWorkerResponse = response.json().await.unwrap_or_default();
                    return Ok(body.params.unwrap_or_default());
                }
                if status < 500 {
                    // redirects and client errors will not get better
                    warn!(status, "terminal error returned from controller");
                    return Err(HttpError::Status(status));
                }
                let delay = backoff.next_delay();
                warn!(status, ?delay, "registration failed, trying again");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                let delay = backoff.next_delay();
                warn!(%err, ?delay, "could not reach controller, trying again");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
