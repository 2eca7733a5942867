//! Rolling metrics window for a running attack

use barrage_core::Outcome;
use std::time::Duration;

/// Success-rate threshold below which a window counts toward the
/// data-invalid alarm.
const SUCCESS_THRESHOLD: f64 = 0.9;
/// Number of consecutive sub-threshold windows that raises the alarm.
const ALARM_WINDOWS: u32 = 5;

/// Request outcomes accumulated since the last flush, plus the alarm state
/// that survives flushes.
#[derive(Debug, Default)]
pub struct MetricsWindow {
    requests: u64,
    successes: u64,
    latency_total: Duration,
    low_success_windows: u32,
}

/// One flushed window, ready for emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    /// Requests per second over the window.
    pub rate: f64,
    /// Successful requests per second over the window.
    pub throughput: f64,
    /// Success percentage, 0..100.
    pub success_pct: f64,
    pub requests: u64,
    pub mean_latency: Duration,
    /// Raised after the success rate stayed below 0.9 for more than five
    /// consecutive windows.
    pub data_invalid: bool,
}

impl MetricsWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outcome: &Outcome) {
        self.requests += 1;
        if outcome.is_success() {
            self.successes += 1;
        }
        self.latency_total += outcome.latency;
    }

    /// Roll the window over and return what it held. Empty windows leave
    /// the alarm state untouched.
    pub fn flush(&mut self, elapsed: Duration) -> WindowSnapshot {
        let requests = self.requests;
        let successes = self.successes;
        let latency_total = self.latency_total;
        self.requests = 0;
        self.successes = 0;
        self.latency_total = Duration::ZERO;

        let secs = elapsed.as_secs_f64();
        let success_rate = if requests > 0 {
            successes as f64 / requests as f64
        } else {
            0.0
        };
        if requests > 0 {
            if success_rate < SUCCESS_THRESHOLD {
                self.low_success_windows += 1;
            } else {
                self.low_success_windows = 0;
            }
        }

        WindowSnapshot {
            rate: if secs > 0.0 { requests as f64 / secs } else { 0.0 },
            throughput: if secs > 0.0 { successes as f64 / secs } else { 0.0 },
            success_pct: success_rate * 100.0,
            requests,
            mean_latency: if requests > 0 {
                latency_total / requests as u32
            } else {
                Duration::ZERO
            },
            data_invalid: self.low_success_windows > ALARM_WINDOWS,
        }
    }

    /// Full reset, used when a new plan replaces the running attack.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, latency_ms: u64) -> Outcome {
        Outcome {
            status,
            latency: Duration::from_millis(latency_ms),
            ..Default::default()
        }
    }

    #[test]
    fn flush_computes_rates_and_resets() {
        let mut window = MetricsWindow::new();
        for _ in 0..8 {
            window.add(&outcome(200, 10));
        }
        for _ in 0..2 {
            window.add(&outcome(500, 30));
        }

        let snapshot = window.flush(Duration::from_secs(1));
        assert_eq!(snapshot.requests, 10);
        assert_eq!(snapshot.rate, 10.0);
        assert_eq!(snapshot.throughput, 8.0);
        assert_eq!(snapshot.success_pct, 80.0);
        assert_eq!(snapshot.mean_latency, Duration::from_millis(14));

        let empty = window.flush(Duration::from_secs(1));
        assert_eq!(empty.requests, 0);
        assert_eq!(empty.rate, 0.0);
    }

    #[test]
    fn alarm_raises_after_five_consecutive_bad_windows() {
        let mut window = MetricsWindow::new();
        for round in 1..=6 {
            window.add(&outcome(500, 1));
            let snapshot = window.flush(Duration::from_secs(1));
            if round <= 5 {
                assert!(!snapshot.data_invalid, "alarm raised early on round {round}");
            } else {
                assert!(snapshot.data_invalid, "alarm missing on round {round}");
            }
        }
    }

    #[test]
    fn alarm_clears_on_a_good_window() {
        let mut window = MetricsWindow::new();
        for _ in 0..5 {
            window.add(&outcome(500, 1));
            window.flush(Duration::from_secs(1));
        }
        window.add(&outcome(200, 1));
        let good = window.flush(Duration::from_secs(1));
        assert!(!good.data_invalid);

        window.add(&outcome(500, 1));
        let bad_again = window.flush(Duration::from_secs(1));
        assert!(!bad_again.data_invalid);
    }

    #[test]
    fn empty_windows_do_not_advance_the_alarm() {
        let mut window = MetricsWindow::new();
        for _ in 0..5 {
            window.add(&outcome(500, 1));
            window.flush(Duration::from_secs(1));
        }
        // a quiet second in between must not trip the alarm either way
        window.flush(Duration::from_secs(1));
        window.add(&outcome(500, 1));
        let snapshot = window.flush(Duration::from_secs(1));
        assert!(snapshot.data_invalid);
    }

    #[test]
    fn reset_clears_alarm_state() {
        let mut window = MetricsWindow::new();
        for _ in 0..10 {
            window.add(&outcome(500, 1));
            window.flush(Duration::from_secs(1));
        }
        window.reset();
        window.add(&outcome(500, 1));
        assert!(!window.flush(Duration::from_secs(1)).data_invalid);
    }
}
