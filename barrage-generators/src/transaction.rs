//! Transaction payload generator

use crate::envelope::{auth_header, envelope_from_body, envelope_url};
use crate::event::{
    event_id, flip, release, simple_random_choice, span_id, unix_timestamp, version,
};
use crate::GeneratorError;
use barrage_core::Target;
use chrono::{DateTime, Utc};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::error;

/// Parameters of a transaction load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionJob {
    #[serde(with = "humantime_serde")]
    pub transaction_duration_min: Duration,
    #[serde(with = "humantime_serde")]
    pub transaction_duration_max: Duration,
    /// Generated timestamps lie between now and now minus this spread.
    #[serde(with = "humantime_serde")]
    pub transaction_timestamp_spread: Duration,
    pub min_spans: usize,
    pub max_spans: usize,
    pub num_projects: usize,
    pub num_releases: u64,
    pub num_users: u64,
    pub min_breadcrumbs: usize,
    pub max_breadcrumbs: usize,
    pub breadcrumb_categories: Vec<String>,
    pub breadcrumb_levels: Vec<String>,
    pub breadcrumb_types: Vec<String>,
    pub breadcrumb_messages: Vec<String>,
    pub measurements: Vec<String>,
    pub operations: Vec<String>,
}

impl Default for TransactionJob {
    fn default() -> Self {
        Self {
            transaction_duration_min: Duration::from_millis(100),
            transaction_duration_max: Duration::from_secs(5),
            transaction_timestamp_spread: Duration::from_secs(10),
            min_spans: 1,
            max_spans: 10,
            num_projects: 1,
            num_releases: 10,
            num_users: 100,
            min_breadcrumbs: 0,
            max_breadcrumbs: 10,
            breadcrumb_categories: Vec::new(),
            breadcrumb_levels: Vec::new(),
            breadcrumb_types: Vec::new(),
            breadcrumb_messages: Vec::new(),
            measurements: Vec::new(),
            operations: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct User {
    #[serde(skip_serializing_if = "String::is_empty")]
    ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
}

#[derive(Debug, Default, Serialize)]
struct OsContext {
    #[serde(rename = "type")]
    context_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rooted: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
}

#[derive(Debug, Default, Serialize)]
struct DeviceContext {
    #[serde(rename = "type")]
    context_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    family: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    arch: String,
    battery_level: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    orientation: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    manufacturer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    brand: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    screen_resolution: String,
    online: bool,
    charging: bool,
    simulator: bool,
}

#[derive(Debug, Default, Serialize)]
struct AppContext {
    #[serde(rename = "type")]
    context_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    app_identifier: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    app_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    app_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    app_build: String,
}

#[derive(Debug, Default, Serialize)]
struct TraceContext {
    #[serde(rename = "type")]
    context_type: String,
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    op: String,
    status: String,
}

#[derive(Debug, Default, Serialize)]
struct Contexts {
    os: OsContext,
    device: DeviceContext,
    app: AppContext,
    trace: TraceContext,
}

#[derive(Debug, Serialize)]
struct Breadcrumb {
    timestamp: f64,
    ty: String,
    category: String,
    level: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct Span {
    timestamp: f64,
    start_timestamp: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    op: String,
    span_id: String,
    parent_span_id: String,
    trace_id: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct Transaction {
    timestamp: String,
    start_timestamp: String,
    event_id: String,
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    release: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    transaction: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    environment: String,
    user: User,
    contexts: Contexts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    breadcrumbs: Vec<Breadcrumb>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    measurements: HashMap<String, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    spans: Vec<Span>,
}

pub struct TransactionTester {
    url: String,
    job: TransactionJob,
}

impl TransactionTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid transaction params received, using defaults");
                TransactionJob::default()
            }),
            None => TransactionJob::default(),
        };
        Self {
            url: target_url.to_string(),
            job,
        }
    }

    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        let provider = barrage_providers::current();
        let project_id = provider.project_id(self.job.num_projects);
        let info = provider.project_info(&project_id);

        target.method = Method::POST;
        target.url = envelope_url(&self.url, &project_id);
        target.headers.insert(
            "x-sentry-auth",
            HeaderValue::from_str(&auth_header(&info.project_key))?,
        );
        target.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-sentry-envelope"),
        );

        let transaction = self.transaction_body();
        let body = serde_json::to_vec(&transaction)?;
        target.body =
            envelope_from_body(&transaction.event_id, Utc::now(), "transaction", &[], &body)?;
        Ok(0)
    }

    fn transaction_body(&self) -> Transaction {
        let mut rng = rand::thread_rng();
        let job = &self.job;

        let now = Utc::now();
        let spread_ms = job.transaction_timestamp_spread.as_millis().max(1) as u64;
        let timestamp = now - chrono::Duration::milliseconds(rng.gen_range(0..spread_ms) as i64);
        let duration_range = job
            .transaction_duration_max
            .saturating_sub(job.transaction_duration_min);
        let duration = job.transaction_duration_min
            + Duration::from_secs_f64(duration_range.as_secs_f64() * rng.gen::<f64>());
        let start_timestamp = timestamp
            - chrono::Duration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64);

        let trace = self.trace_context();
        let spans = self.spans(&trace.span_id, &trace.trace_id, start_timestamp, timestamp);

        Transaction {
            timestamp: timestamp.to_rfc3339(),
            start_timestamp: start_timestamp.to_rfc3339(),
            event_id: event_id(),
            event_type: "transaction",
            release: release(job.num_releases),
            transaction: if flip() {
                String::new()
            } else {
                format!("mytransaction{}", rng.gen_range(0..100))
            },
            environment: simple_random_choice(&["production", "development", "staging"]),
            user: self.user(),
            contexts: Contexts {
                os: os_context(),
                device: device_context(),
                app: app_context(),
                trace,
            },
            breadcrumbs: self.breadcrumbs(),
            measurements: self.measurements(),
            spans,
        }
    }

    fn user(&self) -> User {
        let mut rng = rand::thread_rng();
        let ip_address = version(4, 255);
        if self.job.num_users == 0 {
            return User {
                ip_address,
                ..Default::default()
            };
        }
        User {
            ip_address,
            username: format!("user-{}", rng.gen_range(0..self.job.num_users)),
            id: rng.gen_range(0..self.job.num_users).to_string(),
        }
    }

    fn trace_context(&self) -> TraceContext {
        TraceContext {
            context_type: "trace".into(),
            trace_id: event_id(),
            span_id: span_id(),
            parent_span_id: span_id(),
            op: simple_random_choice(&self.job.operations),
            status: span_status(),
        }
    }

    fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut rng = rand::thread_rng();
        let job = &self.job;
        let max = if job.max_breadcrumbs == 0 {
            50
        } else {
            job.max_breadcrumbs
        };
        let count = job.min_breadcrumbs + rng.gen_range(0..max.saturating_sub(job.min_breadcrumbs).max(1));

        let categories = defaults_or(&job.breadcrumb_categories, &["auth", "web-request", "query"]);
        let levels = defaults_or(
            &job.breadcrumb_levels,
            &["fatal", "error", "warning", "info", "debug"],
        );
        let types = defaults_or(&job.breadcrumb_types, &["default", "http", "error"]);
        let messages = defaults_or(
            &job.breadcrumb_messages,
            &[
                "sending message via: UDP(10.8.0.10:53)",
                "GET http://localhost/xx/xxxx/xxxxxxxxxxxxxx [200]",
                "Authenticating the user_name",
                "IOError: [Errno 2] No such file or directory: '/tmp/someFile/'",
            ],
        );

        (0..count)
            .map(|_| Breadcrumb {
                timestamp: unix_timestamp(Utc::now()),
                ty: simple_random_choice(&types),
                category: simple_random_choice(&categories),
                level: simple_random_choice(&levels),
                message: simple_random_choice(&messages),
            })
            .collect()
    }

    fn measurements(&self) -> HashMap<String, f64> {
        let mut rng = rand::thread_rng();
        self.job
            .measurements
            .iter()
            .map(|name| (name.clone(), rng.gen::<f64>() * 1000.0))
            .collect()
    }

    /// A shallow span tree: spans are children of the transaction or of an
    /// earlier span, each child taking an equal slice of its parent's time.
    fn spans(
        &self,
        transaction_id: &str,
        trace_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Span> {
        let mut rng = rand::thread_rng();
        let job = &self.job;
        let span_range = job.max_spans.saturating_sub(job.min_spans).max(1);
        let num_spans = job.min_spans + rng.gen_range(0..span_range);

        let mut spans: Vec<Span> = Vec::with_capacity(num_spans);

        let mut children_left = rng.gen_range(1..=3u32);
        let mut current_node = 0usize;
        let mut parent_id = transaction_id.to_string();
        let mut parent_start = unix_timestamp(start);
        let mut time_slice = (unix_timestamp(end) - parent_start) / children_left as f64;

        while spans.len() < num_spans {
            if children_left > 0 {
                let span_start = parent_start + time_slice * (children_left - 1) as f64;
                spans.push(Span {
                    timestamp: span_start + time_slice,
                    start_timestamp: span_start,
                    op: simple_random_choice(&job.operations),
                    span_id: span_id(),
                    parent_span_id: parent_id.clone(),
                    trace_id: trace_id.to_string(),
                    status: span_status(),
                });
                children_left -= 1;
            } else {
                children_left = rng.gen_range(1..=3);
                let node = &spans[current_node];
                parent_id = node.span_id.clone();
                parent_start = node.start_timestamp;
                time_slice = (node.timestamp - node.start_timestamp) / children_left as f64;
                current_node += 1;
            }
        }
        spans
    }
}

fn defaults_or(values: &[String], defaults: &[&str]) -> Vec<String> {
    if values.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        values.to_vec()
    }
}

fn span_status() -> String {
    let mut rng = rand::thread_rng();
    if rng.gen_range(0..101) < 100 {
        return "ok".to_string();
    }
    simple_random_choice(&[
        "deadline_exceeded",
        "unauthenticated",
        "permission_denied",
        "not_found",
        "resource_exhausted",
        "invalid_argument",
        "unavailable",
        "internal_error",
        "cancelled",
        "aborted",
    ])
}

fn os_context() -> OsContext {
    if flip() {
        return OsContext::default();
    }
    OsContext {
        context_type: "os".into(),
        rooted: Some(flip()),
        version: version(3, 10),
        name: simple_random_choice(&["Android", "Linux", "iOS"]),
    }
}

fn device_context() -> DeviceContext {
    let mut rng = rand::thread_rng();
    if flip() {
        return DeviceContext::default();
    }
    DeviceContext {
        context_type: "device".into(),
        name: format!("device-{}", rng.gen_range(0..1000)),
        family: simple_random_choice(&["phone", "tablet", "desktop"]),
        model: "NYC-1".into(),
        arch: simple_random_choice(&["x86_64", "arm64"]),
        battery_level: rng.gen::<f64>() * 100.0,
        orientation: simple_random_choice(&["portrait", "landscape"]),
        manufacturer: simple_random_choice(&["Google", "Hasbro"]),
        brand: simple_random_choice(&["google", "zoogle", "moodle", "doodle"]),
        screen_resolution: format!("{}x{}", rng.gen_range(0..1000), rng.gen_range(0..1000)),
        online: flip(),
        charging: flip(),
        simulator: flip(),
    }
}

fn app_context() -> AppContext {
    if flip() {
        return AppContext::default();
    }
    AppContext {
        context_type: "app".into(),
        app_identifier: "io.sentry.sample".into(),
        app_name: "sample".into(),
        app_version: version(3, 10),
        app_build: version(3, 10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_round_trip() {
        let job = TransactionJob {
            transaction_duration_min: Duration::from_secs(1),
            transaction_duration_max: Duration::from_secs(2),
            min_spans: 3,
            max_spans: 7,
            operations: vec!["db".into(), "http".into()],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["transactionDurationMin"], "1s");
        let decoded: TransactionJob = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn span_count_is_within_bounds() {
        let tester = TransactionTester::new(
            "http://target",
            Some(&serde_json::json!({"minSpans": 2, "maxSpans": 6})),
        );
        for _ in 0..50 {
            let transaction = tester.transaction_body();
            assert!((2..6).contains(&transaction.spans.len()));
            for span in &transaction.spans {
                assert_eq!(span.trace_id, transaction.contexts.trace.trace_id);
                assert!(span.timestamp >= span.start_timestamp);
            }
        }
    }

    #[test]
    fn envelope_body_parses() {
        let tester = TransactionTester::new("http://target", None);
        let mut target = Target::default();
        tester.fill_target(&mut target).unwrap();

        let text = String::from_utf8(target.body.clone()).unwrap();
        let lines: Vec<&str> = text.split_terminator('\n').collect();
        assert_eq!(lines.len(), 3);
        let item_header: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(item_header["type"], "transaction");
        let event: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(event["type"], "transaction");
        assert_eq!(event["event_id"].as_str().unwrap().len(), 32);
    }
}
