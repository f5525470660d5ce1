//! FFmpeg CLI wrapper for the Obscura processing core.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress parsing from
//!   `-progress pipe:2`, cancellation, and timeouts
//! - FFprobe media information
//! - Filter-graph construction for blur, voice pitch, and caption overlays
//! - Frame sampling and face detection providers
//! - Thumbnail extraction and audio isolation

pub mod audio;
pub mod command;
pub mod detect;
pub mod error;
pub mod filters;
pub mod frames;
pub mod probe;
pub mod progress;
pub mod thumbnail;

pub use audio::extract_audio;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use detect::{local_detector, scan_for_faces, FaceDetector, FaceScan, StaticDetector};
pub use error::{MediaError, MediaResult};
pub use filters::{BlurSpec, FilterGraph, FilterGraphBuilder};
pub use frames::{SampledFrame, SampledFrames};
pub use probe::{get_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use thumbnail::{generate_thumbnail, thumbnail_path_for};
