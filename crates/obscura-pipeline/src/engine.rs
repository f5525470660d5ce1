//! Processing engines.
//!
//! Capability detection resolves an engine kind once per job; the engines
//! share one contract: a single render invocation consuming the combined
//! filter graph. Stages never call FFmpeg or the remote service directly.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{PipelineResult, ProcessingError};
use obscura_media::{FfmpegCommand, FfmpegRunner, FilterGraph};
use obscura_models::{EncodingConfig, Stage};
use obscura_remote::{RemoteClient, RenderSpec};

/// Execution environment of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Local,
    Remote,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Local => "local",
            EngineKind::Remote => "remote",
        }
    }
}

/// Everything one render invocation needs.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// Source recording
    pub source: PathBuf,
    /// Output artifact path
    pub output: PathBuf,
    /// Combined filter graph from all enabled stages
    pub graph: FilterGraph,
    /// Encoder settings
    pub encoding: EncodingConfig,
    /// Source duration in seconds, for progress interpolation
    pub duration: f64,
}

/// Render progress callback, 0-100 within the render stage.
pub type RenderProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// A transcoding engine.
#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Which environment this engine runs in.
    fn kind(&self) -> EngineKind;

    /// Cheap capability check, resolved once per job.
    async fn is_available(&self) -> bool;

    /// Execute the plan, producing `plan.output`.
    async fn render(&self, plan: &RenderPlan, on_progress: RenderProgressFn) -> PipelineResult<()>;
}

/// On-device engine driving the FFmpeg CLI.
pub struct LocalEngine {
    timeout_secs: u64,
}

impl LocalEngine {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl ProcessingEngine for LocalEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Local
    }

    async fn is_available(&self) -> bool {
        obscura_media::check_ffmpeg().is_ok()
    }

    async fn render(&self, plan: &RenderPlan, on_progress: RenderProgressFn) -> PipelineResult<()> {
        let mut cmd = FfmpegCommand::new(&plan.source, &plan.output);

        if let Some(video) = &plan.graph.video {
            cmd = cmd.filter_complex(video.clone(), FilterGraph::VIDEO_OUT);
        }
        if let Some(audio) = &plan.graph.audio {
            cmd = cmd.audio_filter(audio.clone());
        }
        cmd = cmd.encoding(&plan.encoding);

        debug!(output = ?plan.output, "Starting local render");

        let duration = plan.duration;
        let runner = FfmpegRunner::new().with_timeout(self.timeout_secs);
        runner
            .run_with_progress(&cmd, move |progress| {
                let percent = (progress.fraction(duration) * 100.0) as u8;
                on_progress(percent);
            })
            .await
            .map_err(|e| ProcessingError::from_media(Stage::Render, e))
    }
}

/// Remote engine delegating to the processing service.
pub struct RemoteEngine {
    client: Arc<RemoteClient>,
}

impl RemoteEngine {
    pub fn new(client: Arc<RemoteClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProcessingEngine for RemoteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Remote
    }

    async fn is_available(&self) -> bool {
        self.client.health_check().await
    }

    async fn render(&self, plan: &RenderPlan, on_progress: RenderProgressFn) -> PipelineResult<()> {
        let spec = RenderSpec {
            video_filter: plan.graph.video.clone(),
            audio_filter: plan.graph.audio.clone(),
            encoding: plan.encoding.clone(),
        };

        debug!(output = ?plan.output, "Starting remote render");

        self.client
            .render(&plan.source, &spec, &plan.output, move |percent| {
                on_progress(percent)
            })
            .await
            .map_err(|e| ProcessingError::from_remote(Stage::Render, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_kind_names() {
        assert_eq!(EngineKind::Local.as_str(), "local");
        assert_eq!(EngineKind::Remote.as_str(), "remote");
    }
}
