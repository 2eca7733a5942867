//! Request pacing

use std::time::Duration;

/// A request rate of `freq` hits per `per`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub freq: u64,
    pub per: Duration,
}

impl Rate {
    pub fn new(freq: u64, per: Duration) -> Self {
        Self { freq, per }
    }

    /// The gap between consecutive hits; `None` for a rate that produces no
    /// requests.
    pub fn interval(&self) -> Option<Duration> {
        if self.freq == 0 || self.per.is_zero() {
            return None;
        }
        Some(Duration::from_nanos(
            (self.per.as_nanos() / self.freq as u128) as u64,
        ))
    }

    pub fn per_second(&self) -> f64 {
        if self.per.is_zero() {
            return 0.0;
        }
        self.freq as f64 / self.per.as_secs_f64()
    }
}
