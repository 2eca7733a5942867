//! Statsd-over-UDP sink

use crate::sink::{MetricsSink, NullSink};
use crate::MetricsError;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Statsd client in the datadog dialect.
///
/// Sends are fire-and-forget: a full socket buffer or unreachable server
/// only drops the sample.
pub struct StatsdSink {
    socket: UdpSocket,
    base_tags: Vec<String>,
}

impl StatsdSink {
    pub fn new(server_addr: &str, mut base_tags: Vec<String>) -> Result<Self, MetricsError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(server_addr)?;
        socket.set_nonblocking(true)?;

        match external_ipv4() {
            Ok(ip) => base_tags.push(format!("ip:{ip}")),
            Err(err) => warn!(%err, "could not get worker IP, metrics will not be tagged"),
        }

        Ok(Self { socket, base_tags })
    }

    fn emit(&self, name: &str, value: &str, kind: &str, tags: &[String]) {
        let mut line = format!("{name}:{value}|{kind}");
        let mut all_tags = self.base_tags.iter().chain(tags.iter());
        if let Some(first) = all_tags.next() {
            line.push_str("|#");
            line.push_str(first);
            for tag in all_tags {
                line.push(',');
                line.push_str(tag);
            }
        }
        if let Err(err) = self.socket.send(line.as_bytes()) {
            debug!(%err, "dropped statsd sample");
        }
    }
}

impl MetricsSink for StatsdSink {
    fn gauge(&self, name: &str, value: f64, tags: &[String]) {
        self.emit(name, &value.to_string(), "g", tags);
    }

    fn counter(&self, name: &str, value: i64, tags: &[String]) {
        self.emit(name, &value.to_string(), "c", tags);
    }

    fn timing(&self, name: &str, value: Duration, tags: &[String]) {
        self.emit(name, &value.as_millis().to_string(), "ms", tags);
    }
}

/// Build the process sink: statsd when an address is configured, the null
/// sink otherwise.
pub fn statsd_sink(server_addr: Option<&str>) -> Arc<dyn MetricsSink> {
    let Some(addr) = server_addr.filter(|a| !a.is_empty()) else {
        warn!("no statsd server configured, metrics will not be emitted");
        return Arc::new(NullSink);
    };
    match StatsdSink::new(addr, Vec::new()) {
        Ok(sink) => {
            info!(addr, "initialized statsd client");
            Arc::new(sink)
        }
        Err(err) => {
            warn!(%err, addr, "could not initialize statsd client, metrics disabled");
            Arc::new(NullSink)
        }
    }
}

/// The host's outbound IPv4 address.
///
/// Routes a UDP socket toward a public address to learn the local endpoint;
/// no packet is sent.
pub fn external_ipv4() -> Result<IpAddr, MetricsError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:53")?;
    let addr = socket.local_addr()?;
    match addr.ip() {
        ip @ IpAddr::V4(v4) if !v4.is_loopback() && !v4.is_unspecified() => Ok(ip),
        _ => Err(MetricsError::NoAddress),
    }
}
