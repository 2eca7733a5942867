//! Session payload generator

use crate::envelope::{auth_header, envelope_from_body, envelope_url};
use crate::event::{event_id, weighted_choice};
use crate::GeneratorError;
use barrage_core::Target;
use chrono::{DateTime, Utc};
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

/// Parameters of a session load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SessionJob {
    /// Sessions start up to this long before now.
    #[serde(with = "humantime_serde")]
    pub started_range: Duration,
    /// Session durations are drawn from `[0, duration_range)`.
    #[serde(with = "humantime_serde")]
    pub duration_range: Duration,
    pub num_projects: usize,
    pub num_releases: u64,
    pub num_environments: u64,
    pub num_users: u64,
    pub ok_weight: u64,
    pub exited_weight: u64,
    pub errored_weight: u64,
    pub crashed_weight: u64,
    pub abnormal_weight: u64,
}

impl Default for SessionJob {
    fn default() -> Self {
        Self {
            started_range: Duration::from_secs(60),
            duration_range: Duration::from_secs(60),
            num_projects: 1,
            num_releases: 1,
            num_environments: 1,
            num_users: 1,
            ok_weight: 1,
            exited_weight: 1,
            errored_weight: 1,
            crashed_weight: 1,
            abnormal_weight: 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct SessionAttributes {
    release: String,
    environment: String,
}

#[derive(Debug, Serialize)]
struct Session {
    init: bool,
    started: String,
    status: String,
    errors: u64,
    duration: f64,
    sid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    did: String,
    seq: u64,
    timestamp: String,
    attrs: SessionAttributes,
}

pub struct SessionTester {
    url: String,
    job: SessionJob,
}

impl SessionTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid session params received, using defaults");
                SessionJob::default()
            }),
            None => SessionJob::default(),
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

        let now = Utc::now();
        let session = self.session_body(now);
        let body = serde_json::to_vec(&session)?;
        target.body = envelope_from_body(&event_id(), now, "session", &[], &body)?;
        Ok(0)
    }

    fn session_body(&self, now: DateTime<Utc>) -> Session {
        let mut rng = rand::thread_rng();
        let job = &self.job;

        let start_offset = rng.gen_range(0..job.started_range.as_millis().max(1) as u64);
        let started = now - chrono::Duration::milliseconds(start_offset as i64);
        let duration =
            rng.gen_range(0..job.duration_range.as_millis().max(1) as u64) as f64 / 1000.0;

        let status = weighted_choice(&[
            ("ok", job.ok_weight),
            ("exited", job.exited_weight),
            ("errored", job.errored_weight),
            ("crashed", job.crashed_weight),
            ("abnormal", job.abnormal_weight),
        ])
        .unwrap_or("ok")
        .to_string();

        let (init, seq) = if status == "ok" {
            (true, 0)
        } else {
            (false, rng.gen_range(0..5))
        };
        let errors = if status == "errored" {
            rng.gen_range(1..=19)
        } else {
            0
        };

        Session {
            init,
            started: format_timestamp(started),
            status,
            errors,
            duration,
            sid: event_id(),
            did: format!("u-{}", rng.gen_range(0..job.num_users.max(1))),
            seq,
            timestamp: format_timestamp(now),
            attrs: SessionAttributes {
                release: format!("r-1.0.{}", rng.gen_range(0..job.num_releases.max(1))),
                environment: format!(
                    "environment-{}",
                    rng.gen_range(0..job.num_environments.max(1))
                ),
            },
        }
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_params_fall_back_to_defaults() {
        let tester = SessionTester::new(
            "http://target",
            Some(&serde_json::json!({"started_range": "not a duration"})),
        );
        assert_eq!(tester.job, SessionJob::default());
    }

    #[test]
    fn params_parse() {
        let tester = SessionTester::new(
            "http://target",
            Some(&serde_json::json!({
                "started_range": "2m",
                "duration_range": "30s",
                "num_releases": 7,
                "ok_weight": 10
            })),
        );
        assert_eq!(tester.job.started_range, Duration::from_secs(120));
        assert_eq!(tester.job.num_releases, 7);
        assert_eq!(tester.job.ok_weight, 10);
    }

    #[test]
    fn target_is_an_envelope_post() {
        let tester = SessionTester::new("http://target:9000", None);
        let mut target = Target::default();
        let seq = tester.fill_target(&mut target).unwrap();

        assert_eq!(seq, 0);
        assert_eq!(target.method, Method::POST);
        assert!(target.url.starts_with("http://target:9000/api/"));
        assert!(target.url.ends_with("/envelope/"));
        assert_eq!(
            target.headers.get(CONTENT_TYPE).unwrap(),
            "application/x-sentry-envelope"
        );

        let text = String::from_utf8(target.body.clone()).unwrap();
        let lines: Vec<&str> = text.split_terminator('\n').collect();
        assert_eq!(lines.len(), 3);
        let session: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert!(session["sid"].is_string());
        let status = session["status"].as_str().unwrap();
        assert!(["ok", "exited", "errored", "crashed", "abnormal"].contains(&status));
        if status == "ok" {
            assert_eq!(session["init"], true);
            assert_eq!(session["seq"], 0);
        }
    }
}
