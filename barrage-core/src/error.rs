//! Shared error types

/// Errors produced by the core data model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}
