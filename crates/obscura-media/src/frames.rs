//! Frame sampling for the detection pass.

use std::path::PathBuf;

use tempfile::TempDir;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// One sampled frame on disk.
#[derive(Debug)]
pub struct SampledFrame {
    /// Path of the extracted image
    pub path: PathBuf,
    /// Approximate source timestamp in seconds
    pub timestamp: f64,
}

/// A set of frames sampled from a video at a fixed stride.
///
/// Frames live in a temp directory that is removed when this value drops,
/// on success and failure paths alike; callers additionally discard each
/// frame file as soon as it has been inspected to bound disk usage.
#[derive(Debug)]
pub struct SampledFrames {
    dir: TempDir,
    frames: Vec<SampledFrame>,
}

impl SampledFrames {
    /// Extract frames at `sample_fps` frames per second of source video.
    pub async fn extract(video_path: &std::path::Path, sample_fps: u32) -> MediaResult<Self> {
        if !video_path.exists() {
            return Err(MediaError::FileNotFound(video_path.to_path_buf()));
        }
        if sample_fps == 0 {
            return Err(MediaError::InvalidVideo("sample fps must be positive".into()));
        }

        let dir = TempDir::with_prefix("obscura-frames-")?;
        let pattern = dir.path().join("frame_%05d.jpg");

        let cmd = FfmpegCommand::new(video_path, &pattern)
            .video_filter(format!("fps={sample_fps}"))
            .output_arg("-fps_mode")
            .output_arg("vfr");

        FfmpegRunner::new().run(&cmd).await?;

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("jpg"))
            .collect();
        paths.sort();

        let frames = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| SampledFrame {
                path,
                timestamp: i as f64 / sample_fps as f64,
            })
            .collect::<Vec<_>>();

        debug!(count = frames.len(), "Sampled frames for detection");

        Ok(Self { dir, frames })
    }

    /// The sampled frames in chronological order.
    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    /// Number of sampled frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Delete one frame's image file. Called right after detection so at
    /// most one decoded frame sits on disk beyond the sampling pass.
    pub fn discard(&self, frame: &SampledFrame) {
        if let Err(e) = std::fs::remove_file(&frame.path) {
            debug!(path = ?frame.path, error = %e, "Failed to remove sampled frame");
        }
    }

    /// Path of the containing temp directory.
    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_missing_video() {
        let err = SampledFrames::extract(std::path::Path::new("/nonexistent.mp4"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
