//! The sink trait and its no-op implementation

use std::time::Duration;

/// Capability set every metrics emitter codes against.
pub trait MetricsSink: Send + Sync {
    fn gauge(&self, name: &str, value: f64, tags: &[String]);
    fn counter(&self, name: &str, value: i64, tags: &[String]);
    fn timing(&self, name: &str, value: Duration, tags: &[String]);
    /// Flush and release the underlying transport.
    fn close(&self) {}
}

/// Sink used when no statsd address is configured; drops everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn gauge(&self, _name: &str, _value: f64, _tags: &[String]) {}
    fn counter(&self, _name: &str, _value: i64, _tags: &[String]) {}
    fn timing(&self, _name: &str, _value: Duration, _tags: &[String]) {}
}
