//! Test-type registry
//!
//! Maps a plan's `testType` to the generator builder and the load splitter
//! for that type. The registry is populated during bootstrap and frozen;
//! components receive a read-only handle and there is no registration after
//! start. Registering the same name twice is a programmer error and aborts.

use crate::clickhouse::{clickhouse_insert_split, ClickhouseInsertTester, ClickhouseQueryTester};
use crate::metric_bucket::MetricBucketTester;
use crate::project_config::{project_config_split, ProjectConfigTester};
use crate::session::SessionTester;
use crate::transaction::TransactionTester;
use crate::Generator;
use barrage_core::{simple_split, Splitter};
use std::collections::HashMap;

/// Builds a generator for one plan from the target URL and the plan params.
pub type GeneratorBuilder = fn(&str, Option<&serde_json::Value>) -> Generator;

struct TestTypeEntry {
    builder: GeneratorBuilder,
    splitter: Splitter,
}

/// Collects test types during bootstrap; [`RegistryBuilder::build`] freezes
/// the set.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, TestTypeEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test type. `splitter` defaults to the even split.
    ///
    /// Panics when `name` is already taken: two generators competing for one
    /// test type cannot be reconciled at runtime.
    pub fn register(
        mut self,
        name: &str,
        builder: GeneratorBuilder,
        splitter: Option<Splitter>,
    ) -> Self {
        let entry = TestTypeEntry {
            builder,
            splitter: splitter.unwrap_or(simple_split),
        };
        if self.entries.insert(name.to_string(), entry).is_some() {
            panic!("test type {name:?} registered twice");
        }
        self
    }

    pub fn build(self) -> TestTypeRegistry {
        TestTypeRegistry {
            entries: self.entries,
        }
    }
}

/// Frozen name-to-generator mapping shared by worker and controller.
pub struct TestTypeRegistry {
    entries: HashMap<String, TestTypeEntry>,
}

impl TestTypeRegistry {
    /// Build the generator for a plan; `None` for unknown test types.
    pub fn generator(
        &self,
        test_type: &str,
        target_url: &str,
        params: Option<&serde_json::Value>,
    ) -> Option<Generator> {
        self.entries
            .get(test_type)
            .map(|entry| (entry.builder)(target_url, params))
    }

    /// The splitter for a test type; unknown types fall back to the even
    /// split so the controller can still fan out.
    pub fn splitter(&self, test_type: &str) -> Splitter {
        self.entries
            .get(test_type)
            .map(|entry| entry.splitter)
            .unwrap_or(simple_split)
    }

    pub fn contains(&self, test_type: &str) -> bool {
        self.entries.contains_key(test_type)
    }
}

/// The registry with all built-in test types.
pub fn builtin_registry() -> TestTypeRegistry {
    RegistryBuilder::new()
        .register(
            "session",
            |url, params| Generator::Session(SessionTester::new(url, params)),
            None,
        )
        .register(
            "transaction",
            |url, params| Generator::Transaction(TransactionTester::new(url, params)),
            None,
        )
        .register(
            "metricBucket",
            |url, params| Generator::MetricBucket(MetricBucketTester::new(url, params)),
            None,
        )
        .register(
            "projectConfig",
            |url, params| Generator::ProjectConfig(ProjectConfigTester::new(url, params)),
            Some(project_config_split),
        )
        .register(
            "clickhouseInsert",
            |url, params| Generator::ClickhouseInsert(ClickhouseInsertTester::new(url, params)),
            Some(clickhouse_insert_split),
        )
        .register(
            "clickhouseQuery",
            |url, params| Generator::ClickhouseQuery(ClickhouseQueryTester::new(url, params)),
            None,
        )
        .build()
}
