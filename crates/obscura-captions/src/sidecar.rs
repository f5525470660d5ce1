//! Caption sidecar persistence.
//!
//! Captions are cached next to the source video under a derived filename.
//! Existence plus a freshness check (sidecar at least as new as the video)
//! governs cache hits, so repeat requests never re-invoke the provider.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::error::CaptionResult;
use obscura_models::CaptionData;

/// Extension of the sidecar file, replacing the video's own extension.
pub const SIDECAR_EXTENSION: &str = "captions.json";

/// Derive the sidecar path for a video.
pub fn sidecar_path(video_path: &Path) -> PathBuf {
    video_path.with_extension(SIDECAR_EXTENSION)
}

/// Whether a usable, fresh sidecar exists for this video.
pub fn is_fresh(video_path: &Path) -> bool {
    let sidecar = sidecar_path(video_path);
    if !sidecar.exists() {
        return false;
    }

    match (mtime(&sidecar), mtime(video_path)) {
        (Some(sidecar_mtime), Some(video_mtime)) => sidecar_mtime >= video_mtime,
        // Without both mtimes we cannot prove staleness; existence wins.
        _ => true,
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Read the sidecar for a video. Corrupt or missing data is a cache miss.
pub async fn read_sidecar(video_path: &Path) -> Option<CaptionData> {
    let sidecar = sidecar_path(video_path);

    let bytes = match tokio::fs::read(&sidecar).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = ?sidecar, error = %e, "Caption sidecar miss");
            return None;
        }
    };

    match serde_json::from_slice::<CaptionData>(&bytes) {
        Ok(data) => {
            debug!(path = ?sidecar, segments = data.segments.len(), "Caption sidecar hit");
            Some(data)
        }
        Err(e) => {
            warn!(path = ?sidecar, error = %e, "Caption sidecar corrupt, treating as miss");
            None
        }
    }
}

/// Persist captions next to the video.
pub async fn write_sidecar(video_path: &Path, data: &CaptionData) -> CaptionResult<PathBuf> {
    let sidecar = sidecar_path(video_path);
    let json = serde_json::to_vec_pretty(data)?;
    tokio::fs::write(&sidecar, json).await?;
    debug!(path = ?sidecar, "Wrote caption sidecar");
    Ok(sidecar)
}
