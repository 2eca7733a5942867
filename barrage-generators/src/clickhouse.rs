//! Clickhouse insert and query payload generators

use crate::dataproviders::{BatchBuilder, RowSchema, ValueSpec};
use crate::GeneratorError;
use barrage_core::{simple_split, SplitError, Target, TestPlan};
use http::header::{HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;
use url::Url;

/// Parameters of a clickhouse insert load test.
///
/// `schema` describes the generated columns; `partitions`/`partition_id`
/// are assigned by the splitter so each worker writes a disjoint slice of
/// the key space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClickhouseInsertJob {
    pub table_name: String,
    pub batch_size: u64,
    pub partitions: usize,
    pub partition_id: usize,
    pub num_projects: usize,
    #[serde(skip_serializing_if = "RowSchema::is_empty")]
    pub schema: RowSchema,
}

impl Default for ClickhouseInsertJob {
    fn default() -> Self {
        Self {
            table_name: "eventlog".into(),
            batch_size: 100,
            partitions: 1,
            partition_id: 0,
            num_projects: 1,
            schema: RowSchema::new(),
        }
    }
}

/// Fallback columns when the plan carries no schema.
fn default_schema(job: &ClickhouseInsertJob) -> RowSchema {
    RowSchema::from([
        ("event_id".to_string(), ValueSpec::Uuid),
        (
            "project_id".to_string(),
            ValueSpec::RandomInteger {
                min: 1,
                max: job.num_projects.max(1) as i64 + 1,
            },
        ),
        (
            "timestamp".to_string(),
            ValueSpec::Timestamp {
                format: "%Y-%m-%d %H:%M:%S".into(),
            },
        ),
        (
            "partition".to_string(),
            ValueSpec::Constant {
                value: json!(job.partition_id),
            },
        ),
    ])
}

pub struct ClickhouseInsertTester {
    url: String,
    job: ClickhouseInsertJob,
    batch: BatchBuilder,
}

impl ClickhouseInsertTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job: ClickhouseInsertJob = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid clickhouse insert params received, using defaults");
                ClickhouseInsertJob::default()
            }),
            None => ClickhouseInsertJob::default(),
        };
        let schema = if job.schema.is_empty() {
            default_schema(&job)
        } else {
            job.schema.clone()
        };
        let batch = BatchBuilder::new(schema, job.batch_size);
        Self {
            url: target_url.to_string(),
            job,
            batch,
        }
    }

    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        let job = &self.job;

        let mut body = Vec::new();
        for row in self.batch.build_batch() {
            body.extend_from_slice(&serde_json::to_vec(&row)?);
            body.push(b'\n');
        }

        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut().append_pair(
            "query",
            &format!("INSERT INTO {} FORMAT JSONEachRow", job.table_name),
        );

        target.method = Method::POST;
        target.url = url.to_string();
        target
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        target
            .headers
            .insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip,deflate"));
        target.body = body;
        Ok(0)
    }
}

/// Splitter for clickhouse inserts: besides the usual rate division, each
/// worker is told the partition slice it owns.
pub fn clickhouse_insert_split(
    plan: &TestPlan,
    num_workers: usize,
) -> Result<Vec<TestPlan>, SplitError> {
    let mut job: ClickhouseInsertJob = match &plan.params {
        Some(params) => serde_json::from_value(params.clone())?,
        None => ClickhouseInsertJob::default(),
    };

    let mut plans = simple_split(plan, num_workers)?;
    for (idx, worker_plan) in plans.iter_mut().enumerate() {
        job.partitions = num_workers;
        job.partition_id = idx;
        worker_plan.params = Some(serde_json::to_value(&job)?);
    }
    Ok(plans)
}

/// Parameters of a clickhouse query load test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickhouseQueryJob {
    /// Varies the generated SELECT so query caches do not flatten the load.
    pub multiplier: i64,
}

pub struct ClickhouseQueryTester {
    url: String,
    job: ClickhouseQueryJob,
}

impl ClickhouseQueryTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid clickhouse query params received, using defaults");
                ClickhouseQueryJob::default()
            }),
            None => ClickhouseQueryJob::default(),
        };
        Self {
            url: target_url.to_string(),
            job,
        }
    }

    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("query", &format!("SELECT {};", self.job.multiplier));
        target.method = Method::GET;
        target.url = url.to_string();
        Ok(0)
    }
}
