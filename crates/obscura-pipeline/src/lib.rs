//! Processing orchestrator for the Obscura core.
//!
//! This crate sequences the anonymization pipeline: face scan, voice
//! transform, transcription and caption compositing, one combined render
//! through a local or remote engine with graceful fallback, and artifact
//! finalization. It also wires the background job queue to the adaptive
//! delivery subsystem.

pub mod config;
pub mod engine;
pub mod error;
pub mod inspect;
pub mod jobs;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod retry;

pub use config::PipelineConfig;
pub use engine::{EngineKind, LocalEngine, ProcessingEngine, RemoteEngine, RenderPlan, RenderProgressFn};
pub use error::{ErrorKind, PipelineResult, ProcessingError};
pub use inspect::{FfprobeInspector, MediaInspector, StaticInspector};
pub use jobs::{register_handlers, PreloadPayload, QualityVariantPayload};
pub use logging::JobLogger;
pub use orchestrator::{Orchestrator, OrchestratorParts};
pub use progress::ProgressHub;
pub use retry::{retry_async, RetryConfig};
