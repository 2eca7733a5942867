//! Per-request results yielded by the attacker

use std::time::Duration;

/// The outcome of a single dispatched request.
///
/// `status` is zero when the request never produced a response (transport
/// error or timeout); the error text is then carried in `error`.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Sequence seed returned by the generator when the request was built.
    pub seq: u64,
    pub status: u16,
    pub latency: Duration,
    pub body: Vec<u8>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
