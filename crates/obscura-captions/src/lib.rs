//! Transcription acquisition and caption composition.
//!
//! Providers speak an asynchronous submit/poll protocol (or simulate one
//! locally); words are grouped into fixed-size caption segments whose
//! timing always derives from real word boundaries; results persist as a
//! sidecar file next to the source video.

pub mod error;
pub mod provider;
pub mod segmenter;
pub mod service;
pub mod sidecar;

pub use error::{CaptionError, CaptionResult};
pub use provider::{
    CloudSpeechConfig, CloudSpeechProvider, SimulatedProvider, Transcription,
    TranscriptionProvider,
};
pub use segmenter::segment_words;
pub use service::CaptionService;
pub use sidecar::{is_fresh, read_sidecar, sidecar_path, write_sidecar, SIDECAR_EXTENSION};
