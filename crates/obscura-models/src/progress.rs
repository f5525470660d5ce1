//! Progress event schema.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobId;

/// Pipeline stage names, used for progress events and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Probing and setup
    Prepare,
    /// Face detection pass over sampled frames
    FaceScan,
    /// Speech-to-text acquisition
    Transcription,
    /// Single transcoding run with the combined filter graph
    Render,
    /// Thumbnail, duration, artifact assembly
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::FaceScan => "face_scan",
            Stage::Transcription => "transcription",
            Stage::Render => "render",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress update published by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Job the event belongs to
    pub job_id: JobId,

    /// Overall percent complete, 0-100, non-decreasing per job
    pub percent: u8,

    /// Stage the pipeline is in
    pub stage: Stage,

    /// Human-readable status line
    pub message: String,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: JobId, percent: u8, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            job_id,
            percent: percent.min(100),
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
