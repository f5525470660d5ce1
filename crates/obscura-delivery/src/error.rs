//! Delivery subsystem error types.

use thiserror::Error;

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors from the adaptive delivery subsystem.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Network probe failed: {0}")]
    Probe(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    pub fn probe(message: impl Into<String>) -> Self {
        Self::Probe(message.into())
    }
}
