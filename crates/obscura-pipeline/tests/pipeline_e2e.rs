//! End-to-end pipeline tests with stub engines and simulated providers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use obscura_captions::{CaptionError, CaptionResult, CaptionService, SimulatedProvider, Transcription, TranscriptionProvider};
use obscura_delivery::{NetworkProfiler, QualitySelector, StaticProbe};
use obscura_media::VideoInfo;
use obscura_models::{
    DeviceTier, ExecutionMode, ProcessingOptions, Quality, Stage, VoiceEffect,
    TRANSCRIPTION_UNAVAILABLE,
};
use obscura_pipeline::{
    EngineKind, ErrorKind, Orchestrator, OrchestratorParts, PipelineConfig, PipelineResult,
    ProcessingEngine, ProgressHub, RenderPlan, RenderProgressFn, StaticInspector,
};

/// Engine double: records plans, optionally fails, "renders" by copying.
struct StubEngine {
    kind: EngineKind,
    available: bool,
    fail: bool,
    delay: Duration,
    plans: Mutex<Vec<RenderPlan>>,
    renders: AtomicUsize,
}

impl StubEngine {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            available: true,
            fail: false,
            delay: Duration::from_millis(0),
            plans: Mutex::new(Vec::new()),
            renders: AtomicUsize::new(0),
        }
    }

    fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn last_plan(&self) -> Option<RenderPlan> {
        self.plans.lock().unwrap().last().cloned()
    }

    fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessingEngine for StubEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn render(&self, plan: &RenderPlan, on_progress: RenderProgressFn) -> PipelineResult<()> {
        self.plans.lock().unwrap().push(plan.clone());
        if self.fail {
            return Err(obscura_pipeline::ProcessingError::new(
                Stage::Render,
                ErrorKind::NetworkError("stub engine failure".into()),
            ));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        on_progress(50);
        tokio::fs::copy(&plan.source, &plan.output).await.map_err(|e| {
            obscura_pipeline::ProcessingError::internal(Stage::Render, e.to_string())
        })?;
        on_progress(100);
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingProvider;

#[async_trait]
impl TranscriptionProvider for FailingProvider {
    async fn transcribe(&self, _audio_path: &Path) -> CaptionResult<Transcription> {
        Err(CaptionError::Timeout { attempts: 60 })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn source_info() -> VideoInfo {
    VideoInfo {
        duration: 10.0,
        width: 1920,
        height: 1080,
        fps: 30.0,
        codec: "h264".into(),
        size: 1_048_576,
        audio_sample_rate: Some(44100),
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    source: PathBuf,
    local: Arc<StubEngine>,
    remote: Arc<StubEngine>,
    orchestrator: Arc<Orchestrator>,
}

fn build_harness(
    local: StubEngine,
    remote: StubEngine,
    provider: Arc<dyn TranscriptionProvider>,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("clip.mp4");
    std::fs::write(&source, b"pretend video bytes").unwrap();

    let local = Arc::new(local);
    let remote = Arc::new(remote);

    let config = PipelineConfig {
        output_dir: dir.path().join("out"),
        ..Default::default()
    };

    // Simulated poor network: 0.5 Mbps, 800 ms RTT
    let profiler = Arc::new(NetworkProfiler::new(
        Arc::new(StaticProbe::new(0.5, 800.0)),
        Duration::from_secs(3600),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        config,
        OrchestratorParts {
            local_engine: Some(local.clone() as Arc<dyn ProcessingEngine>),
            remote_engine: Some(remote.clone() as Arc<dyn ProcessingEngine>),
            detector: None,
            inspector: Arc::new(StaticInspector::new(source_info())),
            captions: Arc::new(CaptionService::new(provider)),
            profiler,
            selector: QualitySelector::new(DeviceTier::High),
            progress: Arc::new(ProgressHub::new()),
        },
    ));

    Harness {
        _dir: dir,
        source,
        local,
        remote,
        orchestrator,
    }
}

fn anonymize_options() -> ProcessingOptions {
    ProcessingOptions {
        enable_face_blur: true,
        enable_voice_change: true,
        enable_transcription: true,
        quality: Quality::Medium,
        voice_effect: VoiceEffect::Deep,
        mode: ExecutionMode::Hybrid,
    }
}

#[tokio::test]
async fn no_local_engine_falls_back_to_remote() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).unavailable(),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let mut progress_rx = harness.orchestrator.progress().subscribe();

    let artifact = harness
        .orchestrator
        .process(&harness.source, anonymize_options())
        .await
        .unwrap();

    // Remote engine carried the render
    assert_eq!(harness.local.render_count(), 0);
    assert_eq!(harness.remote.render_count(), 1);

    // Artifact facts
    assert!(artifact.face_blur_applied);
    assert!(artifact.voice_change_applied);
    assert!((artifact.duration - 10.0).abs() < 0.5);
    let transcription = artifact.transcription.as_deref().unwrap();
    assert!(!transcription.is_empty());
    assert_ne!(transcription, TRANSCRIPTION_UNAVAILABLE);

    // The combined graph went to the engine in one invocation
    let plan = harness.remote.last_plan().unwrap();
    assert!(plan.graph.contains("boxblur"));
    assert!(plan.graph.contains("asetrate=44100*0.89"));
    assert!(plan.graph.contains("atempo=1.12"));
    assert!(plan.graph.contains("drawtext"));

    // Progress reached 100 and never decreased
    let mut last = 0u8;
    let mut saw_terminal = false;
    while let Ok(event) = progress_rx.try_recv() {
        assert!(event.percent >= last, "progress regressed");
        last = event.percent;
        if event.percent == 100 {
            saw_terminal = true;
        }
    }
    assert!(saw_terminal, "progress never reached 100");
}

#[tokio::test]
async fn zero_face_detections_blur_the_top_half() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).unavailable(),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let options = ProcessingOptions {
        enable_transcription: false,
        enable_voice_change: false,
        ..anonymize_options()
    };
    harness
        .orchestrator
        .process(&harness.source, options)
        .await
        .unwrap();

    let plan = harness.remote.last_plan().unwrap();
    let video = plan.graph.video.as_deref().unwrap();
    assert!(video.contains("crop=iw:ih/2:0:0"));
    assert!(video.contains("boxblur"));
    assert!(video.contains("overlay=0:0"));
}

#[tokio::test]
async fn disabled_transforms_emit_no_directives() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let artifact = harness
        .orchestrator
        .process(&harness.source, ProcessingOptions::passthrough())
        .await
        .unwrap();

    assert!(!artifact.face_blur_applied);
    assert!(!artifact.voice_change_applied);

    let plan = harness.local.last_plan().unwrap();
    assert!(!plan.graph.contains("boxblur"));
    assert!(!plan.graph.contains("asetrate"));
    assert!(!plan.graph.contains("atempo"));
    assert!(!plan.graph.contains("drawtext"));
}

#[tokio::test]
async fn transcription_timeout_degrades_to_sentinel() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local),
        StubEngine::new(EngineKind::Remote),
        Arc::new(FailingProvider),
    );

    let artifact = harness
        .orchestrator
        .process(&harness.source, anonymize_options())
        .await
        .unwrap();

    // The job completed; captions are simply absent
    assert_eq!(
        artifact.transcription.as_deref(),
        Some(TRANSCRIPTION_UNAVAILABLE)
    );
    let plan = harness.local.last_plan().unwrap();
    assert!(!plan.graph.contains("drawtext"));
}

#[tokio::test]
async fn hybrid_local_failure_retries_remote_once() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).failing(),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let artifact = harness
        .orchestrator
        .process(&harness.source, anonymize_options())
        .await
        .unwrap();

    assert_eq!(harness.remote.render_count(), 1);
    assert!(artifact.uri.ends_with(".mp4"));
}

#[tokio::test]
async fn hybrid_prefers_local_when_available() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    harness
        .orchestrator
        .process(&harness.source, anonymize_options())
        .await
        .unwrap();

    assert_eq!(harness.local.render_count(), 1);
    assert_eq!(harness.remote.render_count(), 0);
}

#[tokio::test]
async fn all_engines_failing_yields_degraded_artifact() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).failing(),
        StubEngine::new(EngineKind::Remote).failing(),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let options = ProcessingOptions {
        enable_transcription: false,
        ..anonymize_options()
    };
    let artifact = harness
        .orchestrator
        .process(&harness.source, options)
        .await
        .unwrap();

    // Unmodified source, flags honest about what was requested
    assert_eq!(artifact.uri, harness.source.to_string_lossy());
    assert!(artifact.face_blur_applied);
    assert!(artifact.voice_change_applied);
    assert!(artifact.thumbnail_uri.is_none());
}

#[tokio::test]
async fn duplicate_submission_attaches_to_inflight_job() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).slow(Duration::from_millis(100)),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let options = ProcessingOptions {
        enable_transcription: false,
        ..anonymize_options()
    };
    let (a, b) = tokio::join!(
        harness.orchestrator.process(&harness.source, options.clone()),
        harness.orchestrator.process(&harness.source, options),
    );

    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.uri, b.uri);

    // One render, not two
    assert_eq!(
        harness.local.render_count() + harness.remote.render_count(),
        1
    );
    assert!(!harness.orchestrator.is_in_flight(&harness.source));
}

#[tokio::test]
async fn abandoned_job_discards_its_result() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local).slow(Duration::from_millis(200)),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let orchestrator = Arc::clone(&harness.orchestrator);
    let source = harness.source.clone();
    let task = tokio::spawn(async move {
        let options = ProcessingOptions {
            enable_transcription: false,
            ..anonymize_options()
        };
        orchestrator.process(&source, options).await
    });

    // Let the job get in flight, then abandon it
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.orchestrator.abandon(&harness.source));

    let result = task.await.unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Abandoned(_)));
}

#[tokio::test]
async fn missing_source_is_a_terminal_error() {
    let harness = build_harness(
        StubEngine::new(EngineKind::Local),
        StubEngine::new(EngineKind::Remote),
        Arc::new(SimulatedProvider::new(10.0)),
    );

    let err = harness
        .orchestrator
        .process("/nonexistent/clip.mp4", ProcessingOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Prepare);
    assert!(matches!(err.kind, ErrorKind::MalformedInput(_)));
    assert!(!err.retryable());
}
