//! Wire types for the remote processing service.

use serde::{Deserialize, Serialize};

use obscura_models::EncodingConfig;

/// What the service should render: the combined filter graph plus encoder
/// settings, produced client-side so local and remote runs are identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSpec {
    /// Labeled video chain, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_filter: Option<String>,

    /// Simple audio chain, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_filter: Option<String>,

    /// Encoder settings
    pub encoding: EncodingConfig,
}

/// Response to a job submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Terminal and intermediate states of a remote job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobState {
    Queued,
    Processing,
    Completed,
    Error,
}

impl RemoteJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteJobState::Completed | RemoteJobState::Error)
    }
}

/// Poll response for a submitted job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: RemoteJobState,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Health endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
