//! Face detection over sampled frames.
//!
//! Detectors run per frame image behind a uniform trait. The scan collapses
//! every detection in the clip into a single padded bounding union; there
//! is no per-frame tracking. Zero detections are reported as `None` so the
//! caller can apply the anonymization policy fallback.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::frames::SampledFrames;
use obscura_models::encoding::FACE_BLUR_PAD_PX;
use obscura_models::FaceRegion;

/// Face detection provider.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detect face bounding boxes in one frame image, in frame pixels.
    async fn detect(&self, frame_path: &Path) -> MediaResult<Vec<FaceRegion>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Outcome of a full face scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceScan {
    /// Padded bounding union of every detection, or `None` if no faces
    /// were found in any sampled frame
    pub region: Option<FaceRegion>,
    /// Number of frames inspected
    pub frames_scanned: usize,
    /// Total number of boxes detected across all frames
    pub detections: usize,
}

/// Scan a video for faces at a fixed sampling stride.
///
/// Each frame image is deleted immediately after inspection; the sampling
/// temp directory is removed when the scan returns, error or not.
pub async fn scan_for_faces(
    video_path: &Path,
    frame_width: u32,
    frame_height: u32,
    detector: Arc<dyn FaceDetector>,
    sample_fps: u32,
) -> MediaResult<FaceScan> {
    let frames = SampledFrames::extract(video_path, sample_fps).await?;

    // Unprobed sources fall back to the first frame's decoded dimensions.
    let (frame_width, frame_height) = if frame_width == 0 || frame_height == 0 {
        frames
            .frames()
            .first()
            .and_then(|f| image::image_dimensions(&f.path).ok())
            .unwrap_or((frame_width, frame_height))
    } else {
        (frame_width, frame_height)
    };

    let mut boxes: Vec<FaceRegion> = Vec::new();
    for frame in frames.frames() {
        match detector.detect(&frame.path).await {
            Ok(found) => boxes.extend(found),
            Err(e) => {
                // One unreadable frame should not abort the scan.
                warn!(
                    timestamp = frame.timestamp,
                    error = %e,
                    "Face detection failed for sampled frame"
                );
            }
        }
        frames.discard(frame);
    }

    let detections = boxes.len();
    let region = FaceRegion::union_all(boxes)
        .map(|merged| merged.padded(FACE_BLUR_PAD_PX, frame_width, frame_height));

    debug!(
        frames = frames.len(),
        detections,
        region = ?region,
        provider = detector.name(),
        "Face scan complete"
    );

    Ok(FaceScan {
        region,
        frames_scanned: frames.len(),
        detections,
    })
}

/// Resolve the best available local detector, or `None` when this host has
/// no detection capability.
pub fn local_detector() -> Option<Arc<dyn FaceDetector>> {
    #[cfg(feature = "opencv")]
    {
        match yunet::YuNetDetector::from_env() {
            Ok(detector) => return Some(Arc::new(detector)),
            Err(e) => {
                warn!(error = %e, "YuNet detector unavailable");
            }
        }
    }

    None
}

/// A detector that reports a fixed set of regions for every frame.
///
/// Used by tests and by the simulated local engine; an empty region list
/// models the zero-detection case.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    regions: Vec<FaceRegion>,
}

impl StaticDetector {
    pub fn new(regions: Vec<FaceRegion>) -> Self {
        Self { regions }
    }

    /// A detector that never finds a face.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FaceDetector for StaticDetector {
    async fn detect(&self, frame_path: &Path) -> MediaResult<Vec<FaceRegion>> {
        if !frame_path.exists() {
            return Err(MediaError::FileNotFound(frame_path.to_path_buf()));
        }
        Ok(self.regions.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(feature = "opencv")]
mod yunet {
    //! YuNet CNN face detection through OpenCV's FaceDetectorYN API.

    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use opencv::core::{Mat, Size};
    use opencv::objdetect::FaceDetectorYN;
    use opencv::prelude::{FaceDetectorYNTrait, MatTraitConst};

    use crate::error::{MediaError, MediaResult};
    use obscura_models::FaceRegion;

    const SCORE_THRESHOLD: f32 = 0.6;
    const NMS_THRESHOLD: f32 = 0.3;
    const TOP_K: i32 = 50;
    const INPUT_WIDTH: i32 = 320;
    const INPUT_HEIGHT: i32 = 320;

    const DEFAULT_MODEL_PATHS: &[&str] = &[
        "/app/models/face_detection_yunet_2023mar.onnx",
        "models/face_detection_yunet_2023mar.onnx",
    ];

    /// YuNet-backed detector. The OpenCV handle requires mutable access,
    /// hence the internal lock.
    pub struct YuNetDetector {
        detector: Mutex<opencv::core::Ptr<FaceDetectorYN>>,
    }

    impl YuNetDetector {
        /// Create from `OBSCURA_YUNET_MODEL` or the default model paths.
        pub fn from_env() -> MediaResult<Self> {
            let model_path = resolve_model_path()
                .ok_or_else(|| MediaError::detection_failed("YuNet model file not found"))?;
            Self::new(&model_path)
        }

        pub fn new(model_path: &Path) -> MediaResult<Self> {
            let detector = FaceDetectorYN::create(
                model_path.to_string_lossy().as_ref(),
                "",
                Size::new(INPUT_WIDTH, INPUT_HEIGHT),
                SCORE_THRESHOLD,
                NMS_THRESHOLD,
                TOP_K,
                0,
                0,
            )
            .map_err(|e| MediaError::detection_failed(format!("YuNet create failed: {e}")))?;

            Ok(Self {
                detector: Mutex::new(detector),
            })
        }

        fn detect_sync(&self, frame_path: &Path) -> MediaResult<Vec<FaceRegion>> {
            let image = opencv::imgcodecs::imread(
                frame_path.to_string_lossy().as_ref(),
                opencv::imgcodecs::IMREAD_COLOR,
            )
            .map_err(|e| MediaError::detection_failed(format!("imread failed: {e}")))?;

            if image.empty() {
                return Ok(Vec::new());
            }

            let (cols, rows) = (image.cols(), image.rows());
            let mut resized = Mat::default();
            opencv::imgproc::resize(
                &image,
                &mut resized,
                Size::new(INPUT_WIDTH, INPUT_HEIGHT),
                0.0,
                0.0,
                opencv::imgproc::INTER_LINEAR,
            )
            .map_err(|e| MediaError::detection_failed(format!("resize failed: {e}")))?;

            let mut detector = self
                .detector
                .lock()
                .map_err(|_| MediaError::detection_failed("detector lock poisoned"))?;

            detector
                .set_input_size(Size::new(INPUT_WIDTH, INPUT_HEIGHT))
                .map_err(|e| MediaError::detection_failed(format!("set_input_size failed: {e}")))?;

            let mut faces = Mat::default();
            detector
                .detect(&resized, &mut faces)
                .map_err(|e| MediaError::detection_failed(format!("detect failed: {e}")))?;

            parse_detections(&faces, cols as f64, rows as f64)
        }

        fn into_region(x: f64, y: f64, w: f64, h: f64) -> Option<FaceRegion> {
            if w <= 0.0 || h <= 0.0 {
                return None;
            }
            Some(FaceRegion::new(
                x.max(0.0) as u32,
                y.max(0.0) as u32,
                w as u32,
                h as u32,
            ))
        }
    }

    #[async_trait]
    impl super::FaceDetector for YuNetDetector {
        async fn detect(&self, frame_path: &Path) -> MediaResult<Vec<FaceRegion>> {
            self.detect_sync(frame_path)
        }

        fn name(&self) -> &'static str {
            "yunet"
        }
    }

    /// YuNet output rows: [x, y, w, h, 5 landmark pairs, score].
    fn parse_detections(faces: &Mat, frame_width: f64, frame_height: f64) -> MediaResult<Vec<FaceRegion>> {
        let num_faces = faces.rows();
        if num_faces <= 0 || faces.cols() < 15 {
            return Ok(Vec::new());
        }

        let scale_x = frame_width / INPUT_WIDTH as f64;
        let scale_y = frame_height / INPUT_HEIGHT as f64;

        let mut regions = Vec::with_capacity(num_faces as usize);
        for i in 0..num_faces {
            let read = |col: i32| faces.at_2d::<f32>(i, col).map(|v| *v as f64);
            let (Ok(x), Ok(y), Ok(w), Ok(h), Ok(score)) =
                (read(0), read(1), read(2), read(3), read(14))
            else {
                continue;
            };

            if score < SCORE_THRESHOLD as f64 {
                continue;
            }

            if let Some(region) =
                YuNetDetector::into_region(x * scale_x, y * scale_y, w * scale_x, h * scale_y)
            {
                regions.push(region);
            }
        }

        Ok(regions)
    }

    fn resolve_model_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("OBSCURA_YUNET_MODEL") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        DEFAULT_MODEL_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }
}

#[cfg(feature = "opencv")]
pub use yunet::YuNetDetector;
