//! Metrics sink for barrage.
//!
//! Emitters hold an `Arc<dyn MetricsSink>`; when no statsd address is
//! configured a [`NullSink`] is installed so no call site needs to branch.
//! The statsd sink speaks the datadog dialect (`|#key:value` tag suffix)
//! over UDP and tags every metric with the host's outbound IPv4 address
//! when it can be discovered.

mod sink;
mod statsd;

pub use sink::{MetricsSink, NullSink};
pub use statsd::{external_ipv4, statsd_sink, StatsdSink};

/// Errors produced while setting up the metrics sink.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("could not set up statsd socket: {0}")]
    Socket(#[from] std::io::Error),

    #[error("no route to determine the outbound address")]
    NoAddress,
}
