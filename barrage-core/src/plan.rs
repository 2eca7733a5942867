//! The test plan command envelope

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A load-test plan as posted by the operator to the controller and fanned
/// out to workers.
///
/// `attack_duration` of zero is a stop request: the receiving worker drops
/// its current attack and idles. `params` is an opaque value handed to the
/// payload generator selected by `test_type`; each generator is responsible
/// for parsing it.
///
/// Example:
/// ```json
/// {
///   "name": "session soak",
///   "testType": "session",
///   "attackDuration": "10m",
///   "numMessages": 100,
///   "per": "1s",
///   "params": {"numReleases": 10},
///   "labels": [["env", "load-test"]]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestPlan {
    /// Free-text identifier, informational only.
    pub name: String,
    /// Free-text description, informational only.
    pub description: String,
    /// Selects the payload generator and the load splitter.
    pub test_type: String,
    /// Total run length; zero stops the current attack.
    #[serde(with = "humantime_serde")]
    pub attack_duration: Duration,
    /// Pacing pair: the effective rate is `num_messages / per`.
    pub num_messages: u64,
    #[serde(with = "humantime_serde")]
    pub per: Duration,
    /// Opaque generator parameters, forwarded verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
    /// Optional annotation pairs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<(String, String)>,
}

impl TestPlan {
    /// A plan with `attack_duration == 0` commands the worker to stop.
    pub fn is_stop(&self) -> bool {
        self.attack_duration.is_zero()
    }

    /// Effective request rate in requests per second.
    ///
    /// Returns `None` when `per` is zero.
    pub fn requests_per_second(&self) -> Option<f64> {
        if self.per.is_zero() {
            return None;
        }
        Some(self.num_messages as f64 / self.per.as_secs_f64())
    }

    /// Check the plan invariants: `per > 0` whenever `attack_duration > 0`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.attack_duration.is_zero() && self.per.is_zero() {
            return Err(CoreError::InvalidPlan(
                "per must be positive when attackDuration is positive".into(),
            ));
        }
        Ok(())
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, CoreError> {
        let plan: TestPlan = serde_json::from_slice(raw)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, CoreError> {
        let plan: TestPlan = serde_yaml::from_str(raw)?;
        plan.validate()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_plan() -> TestPlan {
        TestPlan {
            name: "name".into(),
            description: "description".into(),
            test_type: "session".into(),
            attack_duration: Duration::from_secs(10),
            num_messages: 2,
            per: Duration::from_secs(1),
            params: Some(serde_json::json!({"p1": "v1"})),
            labels: vec![("l1".into(), "v1".into()), ("l2".into(), "v2".into())],
        }
    }

    #[test]
    fn deserialize_request() {
        let request = r#"{
          "attackDuration": "10s",
          "description": "description",
          "labels": [["l1", "v1"], ["l2", "v2"]],
          "name": "name",
          "numMessages": 2,
          "params": {"p1":"v1"},
          "per": "1s",
          "testType": "session"
        }"#;

        let plan = TestPlan::from_json(request.as_bytes()).expect("failed to parse plan");
        assert_eq!(plan, reference_plan());
    }

    #[test]
    fn json_round_trip_is_identity() {
        let plan = reference_plan();
        let encoded = serde_json::to_string(&plan).unwrap();
        let decoded: TestPlan = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn yaml_round_trip_is_identity() {
        let plan = reference_plan();
        let encoded = serde_yaml::to_string(&plan).unwrap();
        let decoded: TestPlan = serde_yaml::from_str(&encoded).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn duration_strings() {
        let plan: TestPlan =
            serde_json::from_str(r#"{"attackDuration": "2s", "per": "1m"}"#).unwrap();
        assert_eq!(plan.attack_duration, Duration::from_secs(2));
        assert_eq!(plan.per, Duration::from_secs(60));

        let encoded = serde_json::to_value(&plan).unwrap();
        assert_eq!(encoded["attackDuration"], "2s");
        assert_eq!(encoded["per"], "1m");

        let from_yaml: TestPlan = serde_yaml::from_str("attackDuration: 2s\nper: 1m\n").unwrap();
        assert_eq!(from_yaml.attack_duration, Duration::from_secs(2));
    }

    #[test]
    fn missing_duration_means_stop() {
        let plan: TestPlan = serde_json::from_str(r#"{"testType": "session"}"#).unwrap();
        assert!(plan.is_stop());
    }

    #[test]
    fn positive_duration_requires_positive_per() {
        let plan = TestPlan {
            attack_duration: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(plan.validate().is_err());
        assert!(TestPlan::default().validate().is_ok());
    }

    #[test]
    fn requests_per_second() {
        let plan = reference_plan();
        assert_eq!(plan.requests_per_second(), Some(2.0));
        assert_eq!(TestPlan::default().requests_per_second(), None);
    }
}
