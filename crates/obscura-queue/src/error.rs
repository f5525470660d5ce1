//! Queue error types.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors from the background job queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Duplicate job rejected: {0}")]
    Duplicate(String),

    #[error("No handler registered for job kind: {0}")]
    NoHandler(String),

    #[error("Queue is shut down")]
    ShutDown,

    #[error("Job handler failed: {message}")]
    HandlerFailed { message: String, retryable: bool },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    /// A handler failure that is worth retrying (network, timeout).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            message: message.into(),
            retryable: true,
        }
    }

    /// A handler failure that retries cannot fix.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::HandlerFailed {
            message: message.into(),
            retryable: false,
        }
    }

    /// Whether the executor should requeue the job.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueueError::HandlerFailed { retryable: true, .. })
    }
}
