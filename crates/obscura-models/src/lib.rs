//! Shared data models for the Obscura processing core.
//!
//! This crate provides Serde-serializable types for:
//! - Processing jobs and options
//! - Face regions and caption data
//! - Finalized artifacts
//! - Network profiles and quality tiers
//! - Progress events and encoding constants

pub mod artifact;
pub mod caption;
pub mod encoding;
pub mod face;
pub mod job;
pub mod network;
pub mod options;
pub mod progress;
pub mod quality;

// Re-export common types
pub use artifact::{ProcessedVideoArtifact, TRANSCRIPTION_UNAVAILABLE};
pub use caption::{CaptionData, CaptionSegment, CaptionWord};
pub use encoding::EncodingConfig;
pub use face::FaceRegion;
pub use job::{JobId, JobState, ProcessingJob};
pub use network::{NetworkProfile, NetworkQuality};
pub use options::{ExecutionMode, ProcessingOptions, Quality, VoiceEffect};
pub use progress::{ProgressEvent, Stage};
pub use quality::{DeviceTier, QualityTier};
