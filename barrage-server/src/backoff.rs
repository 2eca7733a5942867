//! Exponential backoff for the registration retry loop

use std::time::Duration;
use tracing::warn;

/// Exponentially increasing delays, capped at a maximum.
///
/// The uncapped delay keeps growing internally; only the returned value is
/// clamped.
#[derive(Debug)]
pub struct ExponentialBackoff {
    current: Duration,
    maximum: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, maximum: Duration, factor: f64) -> Self {
        let factor = if factor < 1.0 {
            warn!(factor, "backoff factor must be > 1, using 2");
            2.0
        } else {
            factor
        };
        Self {
            current: initial,
            maximum,
            factor,
        }
    }

    /// The delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.maximum);
        self.current = Duration::from_secs_f64(self.current.as_secs_f64() * self.factor);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Duration, expected_ms: u64) {
        let diff = actual.as_millis().abs_diff(expected_ms as u128);
        assert!(diff <= 1, "expected about {expected_ms} ms, got {actual:?}");
    }

    #[test]
    fn delays_grow_by_the_factor_and_cap() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(5), Duration::from_secs(30), 1.4);
        assert_close(backoff.next_delay(), 5000);
        assert_close(backoff.next_delay(), 7000);
        assert_close(backoff.next_delay(), 9800);
        // keeps growing until the cap holds every later delay at 30 s
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            last = backoff.next_delay();
        }
        assert_eq!(last, Duration::from_secs(30));
    }

    #[test]
    fn invalid_factor_falls_back_to_two() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 0.5);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }
}
