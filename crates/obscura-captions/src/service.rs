//! Caption generation service.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::CaptionResult;
use crate::provider::TranscriptionProvider;
use crate::segmenter::segment_words;
use crate::sidecar;
use obscura_models::CaptionData;

/// Produces and caches captions for source videos.
///
/// Constructed explicitly with its provider so tests can instantiate
/// isolated instances; there is no ambient global.
pub struct CaptionService {
    provider: Arc<dyn TranscriptionProvider>,
}

impl CaptionService {
    pub fn new(provider: Arc<dyn TranscriptionProvider>) -> Self {
        Self { provider }
    }

    /// Generate captions for a video, serving the sidecar cache when fresh.
    ///
    /// Repeat calls without `force_regenerate` return the persisted
    /// CaptionData unchanged and never re-invoke the provider.
    pub async fn generate_captions_for_video(
        &self,
        video_path: &Path,
        force_regenerate: bool,
    ) -> CaptionResult<CaptionData> {
        if !force_regenerate && sidecar::is_fresh(video_path) {
            if let Some(cached) = sidecar::read_sidecar(video_path).await {
                debug!(video = ?video_path, "Serving captions from sidecar cache");
                return Ok(cached);
            }
        }

        let workdir = tempfile::TempDir::with_prefix("obscura-audio-")?;
        let audio_path = obscura_media::extract_audio(video_path, workdir.path()).await?;
        self.generate_from_audio(video_path, &audio_path, force_regenerate)
            .await
    }

    /// Generate captions from an already-isolated audio file.
    ///
    /// Split out from [`generate_captions_for_video`] so callers that have
    /// demuxed audio on hand (the orchestrator, tests) skip the extraction.
    pub async fn generate_from_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        force_regenerate: bool,
    ) -> CaptionResult<CaptionData> {
        if !force_regenerate && sidecar::is_fresh(video_path) {
            if let Some(cached) = sidecar::read_sidecar(video_path).await {
                debug!(video = ?video_path, "Serving captions from sidecar cache");
                return Ok(cached);
            }
        }

        let transcription = self.provider.transcribe(audio_path).await?;
        let segments = segment_words(&transcription.words);

        info!(
            video = ?video_path,
            provider = self.provider.name(),
            words = transcription.words.len(),
            segments = segments.len(),
            "Generated captions"
        );

        let data = CaptionData {
            video_path: video_path.to_string_lossy().to_string(),
            language: transcription.language,
            segments,
            generated_at: Utc::now(),
        };

        sidecar::write_sidecar(video_path, &data).await?;
        Ok(data)
    }
}
