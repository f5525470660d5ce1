//! Finalized processing artifact.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sentinel transcription text used when transcription was requested but
/// could not be produced. The artifact still completes; captions are simply
/// omitted.
pub const TRANSCRIPTION_UNAVAILABLE: &str = "Transcription not available";

/// The finalized output of a successful processing job.
///
/// Read-only after creation. Reprocessing the same source produces a new
/// artifact that supersedes this one; artifacts are never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessedVideoArtifact {
    /// Location of the processed video file
    pub uri: String,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Duration in seconds
    pub duration: f64,

    /// Output file size in bytes
    pub size: u64,

    /// Transcript text, or the unavailable sentinel when transcription was
    /// requested but failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    /// Location of the extracted thumbnail, if one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_uri: Option<String>,

    /// Whether the blur filter was part of the rendered graph
    pub face_blur_applied: bool,

    /// Whether the pitch transform was part of the rendered graph
    pub voice_change_applied: bool,
}

impl ProcessedVideoArtifact {
    /// Whether a usable transcript is attached.
    pub fn has_transcription(&self) -> bool {
        self.transcription
            .as_deref()
            .is_some_and(|t| !t.is_empty() && t != TRANSCRIPTION_UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(transcription: Option<String>) -> ProcessedVideoArtifact {
        ProcessedVideoArtifact {
            uri: "/tmp/out.mp4".into(),
            width: 1280,
            height: 720,
            duration: 10.0,
            size: 1024,
            transcription,
            thumbnail_uri: None,
            face_blur_applied: true,
            voice_change_applied: true,
        }
    }

    #[test]
    fn test_has_transcription() {
        assert!(artifact(Some("hello".into())).has_transcription());
        assert!(!artifact(None).has_transcription());
        assert!(!artifact(Some(TRANSCRIPTION_UNAVAILABLE.into())).has_transcription());
        assert!(!artifact(Some(String::new())).has_transcription());
    }
}
