//! Audio track isolation.

use std::path::{Path, PathBuf};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Demux the audio track into a standalone file without re-encoding.
///
/// The output container is chosen from the source's audio codec by FFmpeg;
/// we hand it an `.m4a` target which covers the AAC tracks phones record.
pub async fn extract_audio(
    video_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let video_path = video_path.as_ref();

    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }

    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("audio");
    let output = output_dir.as_ref().join(format!("{stem}.m4a"));

    let cmd = FfmpegCommand::new(video_path, &output).no_video().copy_audio();

    FfmpegRunner::new().run(&cmd).await?;
    Ok(output)
}
