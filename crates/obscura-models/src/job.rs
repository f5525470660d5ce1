//! Processing job lifecycle types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::options::ProcessingOptions;

/// Unique identifier for a processing job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, not yet started
    #[default]
    Pending,
    /// Stages are executing
    Running,
    /// Artifact produced
    Succeeded,
    /// Terminal error surfaced to the caller
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A single video-processing job, owned by the orchestrator until terminal.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingJob {
    /// Unique job ID
    pub id: JobId,

    /// Path of the source recording
    pub source_path: PathBuf,

    /// Options the job was submitted with
    pub options: ProcessingOptions,

    /// Current state
    #[serde(default)]
    pub state: JobState,

    /// Progress (0-100), monotonically non-decreasing
    #[serde(default)]
    pub progress: u8,

    /// Human-readable status line for the current stage
    #[serde(default)]
    pub status_message: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    /// Create a new pending job.
    pub fn new(source_path: impl Into<PathBuf>, options: ProcessingOptions) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source_path: source_path.into(),
            options,
            state: JobState::Pending,
            progress: 0,
            status_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance progress; regressions are clamped away so the reported value
    /// never decreases.
    pub fn set_progress(&mut self, percent: u8, message: impl Into<String>) {
        self.progress = self.progress.max(percent.min(100));
        self.status_message = message.into();
        self.updated_at = Utc::now();
    }

    /// Transition to a new state.
    pub fn set_state(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}
