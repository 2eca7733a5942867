//! Project-config load test
//!
//! The richest test type: a fleet of virtual Relays fetches project
//! configurations in authenticated batches while a configurable fraction of
//! requests invalidates cached configs on the target. Each Relay tracks
//! which projects it has pending and cached so consecutive batches exercise
//! the target's cache the way a real Relay would.

pub mod auth;
pub mod relay;

use crate::GeneratorError;
use auth::{private_key_from_strings, relay_auth_sign};
use barrage_core::{divide, simple_split, Outcome, SplitError, Target, TestPlan};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use http::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use rand::Rng;
use relay::VirtualRelay;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

/// Parameters of a project-config load test.
///
/// ```json
/// {
///   "numRelays": 50,
///   "numProjects": 10000,
///   "minBatchSize": 10,
///   "maxBatchSize": 100,
///   "batchInterval": "5m",
///   "projectInvalidationRatio": 0.001,
///   "relayPublicKey": "ftFuDNBFm8-kPpuCuaWMio_mJAW2txCFCsaLMHn2vv0",
///   "relayPrivateKey": "uZUtRaayN8uuuTTOjbs5EDfqWNwyDfFro6TERx6Wfhs",
///   "relayId": "aaa12340-a123-123b-4567-0afe1f27e066"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfigJob {
    /// Number of virtual Relay state slots.
    pub num_relays: usize,
    /// Size of the project id space used in requests.
    pub num_projects: usize,
    /// Batch sizes are drawn uniformly from `[min, max)`.
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    /// Validity window of a cached project config.
    #[serde(with = "humantime_serde")]
    pub batch_interval: Duration,
    /// Fraction of requests that invalidate a project instead of fetching
    /// configs; kept within one request of the configured value.
    pub project_invalidation_ratio: f64,
    pub relay_public_key: String,
    pub relay_private_key: String,
    pub relay_id: String,
}

impl Default for ProjectConfigJob {
    fn default() -> Self {
        Self {
            num_relays: 1,
            num_projects: 1000,
            min_batch_size: 10,
            max_batch_size: 100,
            batch_interval: Duration::from_secs(300),
            project_invalidation_ratio: 0.0,
            relay_public_key: String::new(),
            relay_private_key: String::new(),
            relay_id: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectConfigRequest {
    public_keys: Vec<String>,
    full_config: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectConfigResponse {
    #[serde(default)]
    pending: Vec<String>,
    #[serde(default)]
    configs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    ProjectConfig,
    InvalidateProject,
}

#[derive(Debug, Default)]
struct SequenceState {
    sequence: u64,
    invalidations_sent: u64,
}

/// State of one running project-config attack.
pub struct ProjectConfigTester {
    url: String,
    job: ProjectConfigJob,
    relays: Vec<Mutex<VirtualRelay>>,
    sequence: Mutex<SequenceState>,
    // decoded on first use, then shared by all requests
    signing_key: Mutex<Option<Arc<SigningKey>>>,
}

impl ProjectConfigTester {
    pub fn new(target_url: &str, params: Option<&serde_json::Value>) -> Self {
        let job = match params {
            Some(raw) => serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                error!(%err, "invalid project config params received, using defaults");
                ProjectConfigJob::default()
            }),
            None => ProjectConfigJob::default(),
        };
        Self::from_job(target_url, job)
    }

    pub fn from_job(target_url: &str, mut job: ProjectConfigJob) -> Self {
        if job.num_relays == 0 {
            warn!("project config plan with zero relays, using one");
            job.num_relays = 1;
        }
        let relays = (0..job.num_relays)
            .map(|_| Mutex::new(VirtualRelay::new()))
            .collect();
        Self {
            url: target_url.to_string(),
            job,
            relays,
            sequence: Mutex::new(SequenceState::default()),
            signing_key: Mutex::new(None),
        }
    }

    /// Advance the shared sequence and decide the kind of the next request.
    ///
    /// An invalidation is emitted whenever the invalidations sent so far
    /// fall behind `sequence * ratio`, which keeps the empirical ratio
    /// within one request of the configured one.
    fn next_sequence(&self) -> (u64, RequestKind) {
        let mut state = self.sequence.lock().expect("sequence lock poisoned");
        state.sequence += 1;
        if state.sequence as f64 * self.job.project_invalidation_ratio
            > state.invalidations_sent as f64
        {
            state.invalidations_sent += 1;
            (state.sequence, RequestKind::InvalidateProject)
        } else {
            (state.sequence, RequestKind::ProjectConfig)
        }
    }

    fn relay_for(&self, sequence: u64) -> &Mutex<VirtualRelay> {
        &self.relays[(sequence % self.relays.len() as u64) as usize]
    }

    fn relay_private_key(&self) -> Result<Arc<SigningKey>, GeneratorError> {
        let mut cached = self.signing_key.lock().expect("signing key lock poisoned");
        if let Some(key) = cached.as_ref() {
            return Ok(Arc::clone(key));
        }
        let key = Arc::new(private_key_from_strings(
            &self.job.relay_public_key,
            &self.job.relay_private_key,
        )?);
        *cached = Some(Arc::clone(&key));
        Ok(key)
    }

    pub fn fill_target(&self, target: &mut Target) -> Result<u64, GeneratorError> {
        let (sequence, kind) = self.next_sequence();
        match kind {
            RequestKind::InvalidateProject => self.fill_invalidation(target, sequence)?,
            RequestKind::ProjectConfig => self.fill_config_fetch(target, sequence)?,
        }
        Ok(sequence)
    }

    /// A POST to the project details endpoint with a body fragment unique
    /// per request, designed to invalidate the project's cached config.
    fn fill_invalidation(&self, target: &mut Target, sequence: u64) -> Result<(), GeneratorError> {
        let provider = barrage_providers::current();
        let max_projects = self.job.num_projects.min(provider.number_of_projects());
        let project_id = provider.project_id(max_projects);
        let info = provider.project_info(&project_id);

        target.method = Method::POST;
        target.url = format!(
            "{}/api/0/projects/{}/{}/",
            self.url.trim_end_matches('/'),
            info.organization_slug,
            info.project_slug
        );
        target
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        target.headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", info.api_key))?,
        );
        target.body = format!(r#"{{"safeFields": ["x-{sequence}"]}}"#).into_bytes();
        Ok(())
    }

    /// A signed bulk fetch of project configs for the Relay owning this
    /// sequence slot.
    fn fill_config_fetch(&self, target: &mut Target, sequence: u64) -> Result<(), GeneratorError> {
        let signing_key = self.relay_private_key()?;
        let provider = barrage_providers::current();
        let job = &self.job;

        let batch_size = if job.max_batch_size > job.min_batch_size {
            job.min_batch_size
                + rand::thread_rng().gen_range(0..job.max_batch_size - job.min_batch_size)
        } else {
            job.min_batch_size
        };

        let now = Utc::now();
        let base_project_id = provider.project_id(job.num_projects);
        let project_ids = {
            let mut relay = self.relay_for(sequence).lock().expect("relay lock poisoned");
            relay.projects_for_request(
                batch_size,
                job.batch_interval,
                job.num_projects,
                now,
                &base_project_id,
                provider,
            )
        };
        if project_ids.is_empty() {
            return Err(GeneratorError::NoProjects);
        }

        let public_keys = project_ids
            .iter()
            .map(|id| provider.project_info(id).project_key)
            .collect();
        let body = serde_json::to_vec(&ProjectConfigRequest {
            public_keys,
            full_config: true,
        })?;
        let signature = relay_auth_sign(&signing_key, &body, now)?;

        target.method = Method::POST;
        target.url = format!(
            "{}/api/0/relays/projectconfigs/?version=3",
            self.url.trim_end_matches('/')
        );
        target
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        target
            .headers
            .insert("x-sentry-relay-signature", HeaderValue::from_str(&signature)?);
        target
            .headers
            .insert("x-sentry-relay-id", HeaderValue::from_str(&job.relay_id)?);
        target.body = body;
        Ok(())
    }

    /// Feed a response back into the owning Relay's cache. Invalidation
    /// responses and unparseable bodies are ignored.
    pub fn process_result(&self, outcome: &Outcome, sequence: u64) {
        let response: ProjectConfigResponse = match serde_json::from_slice(&outcome.body) {
            Ok(response) => response,
            Err(_) => return,
        };
        let resolved: Vec<String> = response.configs.keys().cloned().collect();
        let mut relay = self.relay_for(sequence).lock().expect("relay lock poisoned");
        relay.update_project_states(&response.pending, &resolved, Utc::now());
    }
}

/// Splitter for project-config plans: the usual rate division plus an even
/// partition of the Relay fleet.
pub fn project_config_split(
    plan: &TestPlan,
    num_workers: usize,
) -> Result<Vec<TestPlan>, SplitError> {
    let mut job: ProjectConfigJob = match &plan.params {
        Some(params) => serde_json::from_value(params.clone())?,
        None => ProjectConfigJob::default(),
    };

    let relay_shares = divide(job.num_relays, num_workers)?;
    let mut plans = simple_split(plan, num_workers)?;
    for (worker_plan, share) in plans.iter_mut().zip(relay_shares) {
        job.num_relays = share;
        worker_plan.params = Some(serde_json::to_value(&job)?);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC: &str = "ftFuDNBFm8-kPCoCaaWMio_mJYC2txJuCtwSeHn2vv0";
    const PRIVATE: &str = "uZUtRrryN8jybTTOjbs5EDfqWNwyDfEng4TSRa6Ifhs";

    fn tester(job: ProjectConfigJob) -> ProjectConfigTester {
        ProjectConfigTester::from_job("http://target:9000", job)
    }

    fn signed_job() -> ProjectConfigJob {
        ProjectConfigJob {
            num_relays: 3,
            num_projects: 100,
            min_batch_size: 5,
            max_batch_size: 10,
            relay_public_key: PUBLIC.into(),
            relay_private_key: PRIVATE.into(),
            relay_id: "aaa12340-a123-123b-4567-0afe1f27e066".into(),
            ..Default::default()
        }
    }

    #[test]
    fn config_fetch_is_signed_and_routed() {
        let tester = tester(signed_job());
        let mut target = Target::default();
        let seq = tester.fill_target(&mut target).unwrap();
        assert_eq!(seq, 1);

        assert_eq!(target.method, Method::POST);
        assert_eq!(
            target.url,
            "http://target:9000/api/0/relays/projectconfigs/?version=3"
        );
        assert_eq!(
            target.headers.get("x-sentry-relay-id").unwrap(),
            "aaa12340-a123-123b-4567-0afe1f27e066"
        );
        let signature = target
            .headers
            .get("x-sentry-relay-signature")
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(signature.split('.').count(), 2);

        let body: serde_json::Value = serde_json::from_slice(&target.body).unwrap();
        assert_eq!(body["fullConfig"], true);
        let keys = body["publicKeys"].as_array().unwrap();
        assert!(!keys.is_empty());
        for key in keys {
            assert_eq!(key.as_str().unwrap().len(), 32);
        }
    }

    #[test]
    fn invalidation_ratio_stays_within_one_request() {
        let job = ProjectConfigJob {
            project_invalidation_ratio: 0.25,
            ..signed_job()
        };
        let tester = tester(job);

        let mut invalidations = 0u64;
        let total = 1000u64;
        for _ in 0..total {
            let (seq, kind) = tester.next_sequence();
            if kind == RequestKind::InvalidateProject {
                invalidations += 1;
            }
            let drift = invalidations as f64 - seq as f64 * 0.25;
            assert!(
                drift.abs() <= 1.0,
                "seq {seq}: sent {invalidations}, drift {drift}"
            );
        }
        assert!((invalidations as f64 - total as f64 * 0.25).abs() <= 1.0);
    }

    #[test]
    fn invalidation_body_is_unique_per_sequence() {
        let job = ProjectConfigJob {
            project_invalidation_ratio: 1.0,
            ..signed_job()
        };
        let tester = tester(job);
        let mut target = Target::default();

        let seq = tester.fill_target(&mut target).unwrap();
        assert!(target.url.contains("/api/0/projects/organization-"));
        let body = String::from_utf8(target.body.clone()).unwrap();
        assert_eq!(body, format!(r#"{{"safeFields": ["x-{seq}"]}}"#));

        let seq2 = tester.fill_target(&mut target).unwrap();
        assert_eq!(seq2, seq + 1);
        let body2 = String::from_utf8(target.body.clone()).unwrap();
        assert_ne!(body, body2);
    }

    #[test]
    fn responses_update_the_owning_relay() {
        let tester = tester(signed_job());
        let response = serde_json::json!({
            "pending": ["7", "8"],
            "configs": {"1": {}, "2": {}}
        });
        let outcome = Outcome {
            seq: 4,
            status: 200,
            body: serde_json::to_vec(&response).unwrap(),
            ..Default::default()
        };
        tester.process_result(&outcome, 4);

        // sequence 4 maps onto relay 4 % 3 == 1
        let relay = tester.relays[1].lock().unwrap();
        assert!(relay.is_pending("7"));
        assert!(relay.is_pending("8"));
        assert!(relay.is_cached("1"));
        assert!(relay.is_cached("2"));
        assert!(!relay.is_pending("1"));

        drop(relay);
        let untouched = tester.relays[0].lock().unwrap();
        assert_eq!(untouched.pending_count(), 0);
        assert_eq!(untouched.cached_count(), 0);
    }

    #[test]
    fn non_json_responses_are_ignored() {
        let tester = tester(signed_job());
        let outcome = Outcome {
            status: 200,
            body: b"<html>not json</html>".to_vec(),
            ..Default::default()
        };
        tester.process_result(&outcome, 1);
        for relay in &tester.relays {
            let relay = relay.lock().unwrap();
            assert_eq!(relay.pending_count() + relay.cached_count(), 0);
        }
    }

    #[test]
    fn missing_credentials_fail_the_config_request_only() {
        let job = ProjectConfigJob {
            relay_public_key: String::new(),
            relay_private_key: String::new(),
            ..signed_job()
        };
        let tester = tester(job);
        let mut target = Target::default();
        assert!(matches!(
            tester.fill_target(&mut target),
            Err(GeneratorError::Credentials(_))
        ));
    }

    #[test]
    fn split_partitions_relays_and_rate() {
        let plan = TestPlan {
            test_type: "projectConfig".into(),
            attack_duration: Duration::from_secs(10),
            num_messages: 10,
            per: Duration::from_secs(1),
            params: Some(serde_json::to_value(ProjectConfigJob {
                num_relays: 7,
                ..signed_job()
            }).unwrap()),
            ..Default::default()
        };

        let plans = project_config_split(&plan, 3).unwrap();
        assert_eq!(plans.len(), 3);

        let mut relay_total = 0;
        for sub in &plans {
            assert_eq!(sub.per, Duration::from_secs(3));
            let job: ProjectConfigJob =
                serde_json::from_value(sub.params.clone().unwrap()).unwrap();
            relay_total += job.num_relays;
        }
        assert_eq!(relay_total, 7);

        let aggregate: f64 = plans.iter().filter_map(|p| p.requests_per_second()).sum();
        assert_eq!(aggregate, plan.requests_per_second().unwrap());
    }
}
