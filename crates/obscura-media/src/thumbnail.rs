//! Thumbnail extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::filter_thumbnail;
use obscura_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_TIMESTAMP};

/// Extract a single-frame thumbnail from a video file.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video_path.as_ref(), output_path.as_ref())
        .seek(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .video_filter(filter_thumbnail(THUMBNAIL_SCALE_WIDTH));

    FfmpegRunner::new().run(&cmd).await
}

/// Derive the thumbnail path for an output video (`.jpg` alongside it).
pub fn thumbnail_path_for(video_path: &Path) -> std::path::PathBuf {
    video_path.with_extension("jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_path() {
        let p = thumbnail_path_for(Path::new("/tmp/out.mp4"));
        assert_eq!(p, Path::new("/tmp/out.jpg"));
    }

    #[test]
    fn test_thumbnail_filter_width() {
        assert_eq!(filter_thumbnail(THUMBNAIL_SCALE_WIDTH), "scale=480:-2");
    }
}
