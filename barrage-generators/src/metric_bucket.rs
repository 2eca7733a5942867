//! Metric bucket payload generator

use crate::envelope::{auth_header, envelope_from_body, envelope_url};
use crate::event::event_id;
use crate::GeneratorError;
use barrage_core::Target;
use barrage_providers::FreqProfile;
use chrono::Utc;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::Method;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, warn};

/// One project group with a pick weight and an artificial timestamp delay
/// applied to buckets generated for projects of the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BucketProfile {
    pub num_projects: usize,
    pub relative_freq_weight: f64,
    #[serde(with = "humantime_serde")]
    pub timestamp_delay: Duration,
}

impl Default for BucketProfile {
    fn default() -> Self {
        Self {
            num_projects: 1,
            relative_freq_weight: 1.0,
            timestamp_delay: Duration::ZERO,
        }
    }
}

/// Parameters of a metric-bucket load test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricBucketJob {
    /// Size of the metric name pool.
    pub num_metric_names: u64,
    pub num_projects: usize,
    pub num_distributions: usize,
    pub num_gauges: usize,
    pub num_sets: usize,
    pub num_counters: usize,
    /// When present, projects are drawn across these groups instead of
    /// uniformly; the selected group's delay backdates the bucket timestamps.
    pub project_freq_profiles: Vec<BucketProfile>,
}

impl Default for MetricBucketJob {
    fn default() -> Self {
        Self {
            num_metric_names: 1,
            num_projects: 1,
            num_distributions: 1,
            num_gauges: 1,
            num_sets: 1,
            num_counters: 1,
            project_freq_profiles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
enum BucketType {
    #[serde(rename = "d")]
    Distribution,
    #[serde(rename = "c")]
    Counter,
    #[serde(rename = "s")]
    Set,
    #[serde(rename = "g")]
    Gauge,
}

impl BucketType {
    fn prefix(self) -> char {
        match self {
            BucketType::Distribution => 'd',
            BucketType::Counter => 'c',
            BucketType::Set => 's',
            BucketType::Gauge => 'g',
        }
    }
}

#[derive(Debug, Serialize)]
struct GaugeValue {
    max: f64,
    min: f64,
    sum: f64,
    last: f64,
    count: u64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BucketValue {
    Distribution(Vec<f64>),
    Counter(f64),
    Set(Vec<u32>),
    Gauge(GaugeValue),
}

#[derive(Debug, Serialize)]
struct MetricBucket {
    name: String,
    unit: String,
    width: u64,
    #[serde(rename = "type")]
    bucket_type: BucketType,
    value: BucketValue,
    timestamp: i64,
    tags: HashMap<String, String>,
}

pub struct MetricBucketTester {
    url: String,
    job: MetricBucketJob,
}

impl MetricBucketTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid metric bucket params received, using defaults");
                MetricBucketJob::default()
            }),
            None => MetricBucketJob::default(),
        };
        Self {
            url: target_url.to_string(),
            job,
        }
    }

    /// Pick the project for this request and the timestamp delay of its
    /// profile group.
    fn pick_project(&self) -> Result<(String, Duration), GeneratorError> {
        let provider = barrage_providers::current();
        if self.job.project_freq_profiles.is_empty() {
            return Ok((provider.project_id(self.job.num_projects), Duration::ZERO));
        }
        let profiles: Vec<FreqProfile> = self
            .job
            .project_freq_profiles
            .iter()
            .map(|p| FreqProfile {
                num_projects: p.num_projects,
                relative_freq_weight: p.relative_freq_weight,
            })
            .collect();
        match provider.project_id_weighted(&profiles) {
            Ok((id, group_idx)) => {
                let delay = self.job.project_freq_profiles[group_idx].timestamp_delay;
                Ok((id, delay))
            }
            Err(err) => {
                warn!(%err, "weighted project selection failed");
                Err(err.into())
            }
        }
    }

    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        let provider = barrage_providers::current();
        let (project_id, timestamp_delay) = self.pick_project()?;
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

        let timestamp = (Utc::now() - chrono::Duration::seconds(timestamp_delay.as_secs() as i64))
            .timestamp();
        let job = &self.job;
        let mut buckets =
            Vec::with_capacity(job.num_counters + job.num_sets + job.num_distributions + job.num_gauges);
        for _ in 0..job.num_counters {
            buckets.push(self.bucket(BucketType::Counter, timestamp));
        }
        for _ in 0..job.num_sets {
            buckets.push(self.bucket(BucketType::Set, timestamp));
        }
        for _ in 0..job.num_distributions {
            buckets.push(self.bucket(BucketType::Distribution, timestamp));
        }
        for _ in 0..job.num_gauges {
            buckets.push(self.bucket(BucketType::Gauge, timestamp));
        }
        let body = serde_json::to_vec(&buckets)?;

        let extra_headers = [(
            "public_key",
            serde_json::Value::String(info.project_key.clone()),
        )];
        target.body = envelope_from_body(
            &event_id(),
            Utc::now(),
            "metric_buckets",
            &extra_headers,
            &body,
        )?;
        Ok(0)
    }

    fn bucket(&self, bucket_type: BucketType, timestamp: i64) -> MetricBucket {
        let mut rng = rand::thread_rng();
        let name_pool = self.job.num_metric_names.max(1);
        let metric_name = format!("metric{}", rng.gen_range(0..name_pool));
        let full_name = format!("{}:{}/transactions@none", bucket_type.prefix(), metric_name);

        let value = match bucket_type {
            BucketType::Distribution => BucketValue::Distribution(
                (0..rng.gen_range(1..=8)).map(|_| rng.gen::<f64>() * 100.0).collect(),
            ),
            BucketType::Counter => BucketValue::Counter(rng.gen::<f64>() * 100.0),
            BucketType::Set => {
                BucketValue::Set((0..rng.gen_range(1..=8)).map(|_| rng.gen_range(0..1000)).collect())
            }
            BucketType::Gauge => {
                let min = rng.gen::<f64>() * 10.0;
                let max = min + rng.gen::<f64>() * 10.0;
                let count = rng.gen_range(1..10u64);
                BucketValue::Gauge(GaugeValue {
                    max,
                    min,
                    sum: max * count as f64,
                    last: min,
                    count,
                })
            }
        };

        MetricBucket {
            name: full_name,
            unit: "none".into(),
            width: 1,
            bucket_type,
            value,
            timestamp,
            tags: HashMap::from([("env".to_string(), "load-test".to_string())]),
        }
    }
}
