//! Transport error types

/// Error type for outbound HTTP operations.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("peer returned status {0}")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Client errors are terminal for registration; everything else is
    /// worth retrying.
    pub fn is_terminal(&self) -> bool {
        matches!(self, HttpError::Status(status) if (400..500).contains(status))
            || matches!(self, HttpError::InvalidUrl(_))
    }
}
