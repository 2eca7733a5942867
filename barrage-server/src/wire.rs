//! JSON envelopes exchanged between controller and workers

use serde::{Deserialize, Serialize};

/// Body of the registration request a worker posts to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWorkerRequest {
    pub worker_url: String,
}

/// Configuration the controller hands back on successful registration;
/// present fields take precedence over the worker's local configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statsd_server_url: Option<String>,
}

/// Registration response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterWorkerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ConfigParams>,
}

impl RegisterWorkerResponse {
    pub fn ok(target_url: &str, statsd_server_url: Option<&str>) -> Self {
        Self {
            error: None,
            status: Some("ok".to_string()),
            params: Some(ConfigParams {
                target_url: Some(target_url.to_string()),
                statsd_server_url: statsd_server_url.map(str::to_string),
            }),
        }
    }
}

pub fn ok_json() -> serde_json::Value {
    serde_json::json!({"status": "ok"})
}

pub fn error_json(message: &str) -> serde_json::Value {
    serde_json::json!({"error": message})
}
