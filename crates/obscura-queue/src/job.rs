//! Background job definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueJobId(pub String);

impl QueueJobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority ordering: low < normal < high.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
        }
    }
}

/// Kinds of long-running background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Trim the artifact cache toward its budget
    CacheOptimization,
    /// Pre-render quality variants of a processed artifact
    QualityVariantGeneration,
    /// Fetch media into the cache ahead of playback
    VideoPreloading,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::CacheOptimization => "cache_optimization",
            JobKind::QualityVariantGeneration => "quality_variant_generation",
            JobKind::VideoPreloading => "video_preloading",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    /// Unique job ID
    pub id: QueueJobId,

    /// What to do
    pub kind: JobKind,

    /// Scheduling priority
    pub priority: JobPriority,

    /// Kind-specific payload
    pub payload: serde_json::Value,

    /// Executed attempts so far
    #[serde(default)]
    pub attempts: u32,

    /// Enqueue timestamp
    pub enqueued_at: DateTime<Utc>,
}

impl BackgroundJob {
    pub fn new(kind: JobKind, payload: serde_json::Value, priority: JobPriority) -> Self {
        Self {
            id: QueueJobId::new(),
            kind,
            priority,
            payload,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }

    /// Key for the per-job single-flight guarantee: one job per kind and
    /// payload may be queued or running at a time.
    pub fn single_flight_key(&self) -> String {
        format!("{}:{}", self.kind, self.payload)
    }
}
