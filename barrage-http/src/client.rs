//! Configured reqwest client builders

use crate::errors::HttpError;
use std::time::Duration;
use tracing::debug;

/// Knobs for building an outbound HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            follow_redirects: false,
            user_agent: concat!("barrage/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn build(&self) -> Result<reqwest::Client, HttpError> {
        debug!(timeout_ms = self.timeout.as_millis() as u64, "building HTTP client");
        let redirects = if self.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .redirect(redirects)
            .build()?;
        Ok(client)
    }
}

/// Client for controller-to-worker control calls (1 s budget).
pub fn control_client() -> Result<reqwest::Client, HttpError> {
    ClientConfig {
        timeout: Duration::from_secs(1),
        ..Default::default()
    }
    .build()
}

/// Client for worker-to-controller registration (2 s budget).
pub fn registration_client() -> Result<reqwest::Client, HttpError> {
    ClientConfig {
        timeout: Duration::from_secs(2),
        ..Default::default()
    }
    .build()
}

/// Client for load-generation requests: tight timeout, redirects disabled,
/// no retries anywhere in the stack.
pub fn attack_client(timeout: Duration) -> Result<reqwest::Client, HttpError> {
    ClientConfig {
        timeout,
        follow_redirects: false,
        ..Default::default()
    }
    .build()
}
