//! Media inspection behind a trait.
//!
//! Probing and thumbnailing go through this seam so the orchestrator can
//! run against hosts without the FFmpeg toolchain (and so tests can pin
//! deterministic media facts).

use std::path::Path;

use async_trait::async_trait;

use obscura_media::{MediaResult, VideoInfo};

/// Source/output inspection operations the orchestrator needs.
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Probe a media file.
    async fn inspect(&self, path: &Path) -> MediaResult<VideoInfo>;

    /// Extract a thumbnail.
    async fn thumbnail(&self, video: &Path, output: &Path) -> MediaResult<()>;

    /// Whether inspection is possible on this host at all.
    fn is_available(&self) -> bool;
}

/// FFprobe/FFmpeg-backed inspector.
pub struct FfprobeInspector;

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn inspect(&self, path: &Path) -> MediaResult<VideoInfo> {
        obscura_media::probe_video(path).await
    }

    async fn thumbnail(&self, video: &Path, output: &Path) -> MediaResult<()> {
        obscura_media::generate_thumbnail(video, output).await
    }

    fn is_available(&self) -> bool {
        obscura_media::check_ffprobe().is_ok()
    }
}

/// Fixed-answer inspector for tests and toolchain-free hosts.
pub struct StaticInspector {
    pub info: VideoInfo,
}

impl StaticInspector {
    pub fn new(info: VideoInfo) -> Self {
        Self { info }
    }
}

#[async_trait]
impl MediaInspector for StaticInspector {
    async fn inspect(&self, path: &Path) -> MediaResult<VideoInfo> {
        if !path.exists() {
            return Err(obscura_media::MediaError::FileNotFound(path.to_path_buf()));
        }
        Ok(self.info.clone())
    }

    async fn thumbnail(&self, _video: &Path, output: &Path) -> MediaResult<()> {
        tokio::fs::write(output, b"").await?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}
