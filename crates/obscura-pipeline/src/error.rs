//! Pipeline error taxonomy.
//!
//! Every failure carries the stage it happened in and whether a retry is
//! worth offering. The type is `Clone` so waiters attached to an in-flight
//! job can all observe the same terminal error.

use thiserror::Error;

use obscura_models::Stage;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, ProcessingError>;

/// Classified failure causes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("job abandoned: {0}")]
    Abandoned(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A processing failure attributed to a pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("processing failed in {stage}: {kind}")]
pub struct ProcessingError {
    /// Stage that failed
    pub stage: Stage,
    /// Classified cause
    pub kind: ErrorKind,
}

impl ProcessingError {
    pub fn new(stage: Stage, kind: ErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn malformed(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, ErrorKind::MalformedInput(message.into()))
    }

    pub fn engine_unavailable(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, ErrorKind::EngineUnavailable(message.into()))
    }

    pub fn internal(stage: Stage, message: impl Into<String>) -> Self {
        Self::new(stage, ErrorKind::Internal(message.into()))
    }

    pub fn abandoned(stage: Stage) -> Self {
        Self::new(
            stage,
            ErrorKind::Abandoned("job superseded before completion".into()),
        )
    }

    /// Whether the caller should be offered a retry.
    pub fn retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::NetworkError(_) | ErrorKind::Timeout(_))
    }

    /// Attribute a media error to a stage.
    pub fn from_media(stage: Stage, err: obscura_media::MediaError) -> Self {
        use obscura_media::MediaError;
        let kind = match err {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                ErrorKind::EngineUnavailable(err.to_string())
            }
            MediaError::DetectorUnavailable => ErrorKind::EngineUnavailable(err.to_string()),
            MediaError::Timeout(_) => ErrorKind::Timeout(err.to_string()),
            MediaError::FileNotFound(_) | MediaError::InvalidVideo(_) => {
                ErrorKind::MalformedInput(err.to_string())
            }
            MediaError::PermissionDenied(_) => ErrorKind::PermissionDenied(err.to_string()),
            MediaError::FfmpegFailed { .. }
            | MediaError::FfprobeFailed { .. }
            | MediaError::DetectionFailed(_) => ErrorKind::ProviderError(err.to_string()),
            MediaError::Io(ref io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::PermissionDenied(err.to_string())
            }
            MediaError::Cancelled => ErrorKind::Abandoned(err.to_string()),
            other => ErrorKind::Internal(other.to_string()),
        };
        Self::new(stage, kind)
    }

    /// Attribute a caption error to a stage.
    pub fn from_caption(stage: Stage, err: obscura_captions::CaptionError) -> Self {
        use obscura_captions::CaptionError;
        let kind = match err {
            CaptionError::Network(_) => ErrorKind::NetworkError(err.to_string()),
            CaptionError::Timeout { .. } => ErrorKind::Timeout(err.to_string()),
            CaptionError::ProviderUnavailable | CaptionError::Provider(_) => {
                ErrorKind::ProviderError(err.to_string())
            }
            CaptionError::InvalidAudio(_) => ErrorKind::MalformedInput(err.to_string()),
            CaptionError::Media(media) => return Self::from_media(stage, media),
            other => ErrorKind::Internal(other.to_string()),
        };
        Self::new(stage, kind)
    }

    /// Attribute a remote service error to a stage.
    pub fn from_remote(stage: Stage, err: obscura_remote::RemoteError) -> Self {
        use obscura_remote::RemoteError;
        let kind = match err {
            RemoteError::Network(_) => ErrorKind::NetworkError(err.to_string()),
            RemoteError::Timeout { .. } => ErrorKind::Timeout(err.to_string()),
            RemoteError::JobFailed(_) | RemoteError::RequestFailed(_) => {
                ErrorKind::ProviderError(err.to_string())
            }
            other => ErrorKind::Internal(other.to_string()),
        };
        Self::new(stage, kind)
    }
}
