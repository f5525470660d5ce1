//! Caption and transcription error types.

use thiserror::Error;

/// Result type for caption operations.
pub type CaptionResult<T> = Result<T, CaptionError>;

/// Errors that can occur during transcription and caption handling.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("No transcription provider configured")]
    ProviderUnavailable,

    #[error("Transcription provider failed: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transcription polling timed out after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Invalid audio input: {0}")]
    InvalidAudio(String),

    #[error("Audio isolation failed: {0}")]
    Media(#[from] obscura_media::MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptionError {
    /// Create a provider failure error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Whether retrying could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptionError::Network(_) | CaptionError::Timeout { .. })
    }
}
