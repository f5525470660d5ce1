//! Remote service error types.

use thiserror::Error;

/// Result type for remote service operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors from the remote processing service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote request failed: {0}")]
    RequestFailed(String),

    #[error("Remote job failed: {0}")]
    JobFailed(String),

    #[error("Remote polling timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RemoteError::Timeout { .. } => true,
            _ => false,
        }
    }
}
