//! Server error types

/// Errors that abort controller or worker bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not bind listener: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] barrage_http::HttpError),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
