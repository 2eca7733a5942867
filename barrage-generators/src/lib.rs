//! Payload generators for barrage load tests.
//!
//! A [`Generator`] produces the request stream for one test type. The worker
//! builds one generator per plan from the [`registry`] and hands it to the
//! attacker as a [`Targeter`]; the attacker calls back with every response so
//! stateful generators (project-config) can track the target's reaction.

pub mod clickhouse;
pub mod dataproviders;
pub mod envelope;
pub mod event;
pub mod metric_bucket;
pub mod project_config;
pub mod registry;
pub mod session;
pub mod transaction;

use barrage_core::{Outcome, Target, TargetError, Targeter};

pub use registry::{builtin_registry, RegistryBuilder, TestTypeRegistry};

/// Errors local to a single generated request.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("unknown test type: {0}")]
    UnknownTestType(String),

    #[error("no projects available for virtual relay")]
    NoProjects,

    #[error("invalid relay credentials: {0}")]
    Credentials(String),

    #[error("provider error: {0}")]
    Provider(#[from] barrage_providers::ProviderError),

    #[error("could not encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid header value: {0}")]
    Header(#[from] http::header::InvalidHeaderValue),

    #[error("invalid target URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One payload generator, selected by the plan's `testType`.
///
/// The variants carry the per-plan state of the respective test type; the
/// project-config variant is the only one that keeps evolving state across
/// requests.
pub enum Generator {
    Session(session::SessionTester),
    Transaction(transaction::TransactionTester),
    MetricBucket(metric_bucket::MetricBucketTester),
    ProjectConfig(project_config::ProjectConfigTester),
    ClickhouseInsert(clickhouse::ClickhouseInsertTester),
    ClickhouseQuery(clickhouse::ClickhouseQueryTester),
}

impl Generator {
    /// Fill the next request record; returns the sequence seed to pair with
    /// the response.
    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        target.clear();
        match self {
            Generator::Session(tester) => tester.fill_target(target),
            Generator::Transaction(tester) => tester.fill_target(target),
            Generator::MetricBucket(tester) => tester.fill_target(target),
            Generator::ProjectConfig(tester) => tester.fill_target(target),
            Generator::ClickhouseInsert(tester) => tester.fill_target(target),
            Generator::ClickhouseQuery(tester) => tester.fill_target(target),
        }
    }

    /// Consume one response. Only the project-config generator reacts.
    pub fn handle_result(&self, outcome: &Outcome, seq: u64) {
        if let Generator::ProjectConfig(tester) = self {
            tester.process_result(outcome, seq);
        }
    }
}

impl Targeter for Generator {
    fn next(&self, target: &mut Target) -> Result<u64, TargetError> {
        self.fill_target(target).map_err(Into::into)
    }

    fn process_result(&self, outcome: &Outcome, seq: u64) {
        self.handle_result(outcome, seq);
    }
}
