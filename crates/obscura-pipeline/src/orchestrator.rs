//! Processing orchestrator.
//!
//! Sequences the stages of one job, selects the execution environment with
//! graceful fallback, publishes monotonic progress, and enforces the
//! per-source single-flight invariant.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::engine::{EngineKind, ProcessingEngine, RenderPlan, RenderProgressFn};
use crate::error::{PipelineResult, ProcessingError};
use crate::inspect::MediaInspector;
use crate::logging::JobLogger;
use crate::progress::ProgressHub;
use crate::retry::{retry_async, RetryConfig};
use obscura_captions::{CaptionError, CaptionService};
use obscura_delivery::{NetworkProfiler, QualitySelector};
use obscura_media::{scan_for_faces, BlurSpec, FaceDetector, FilterGraphBuilder, VideoInfo};
use obscura_models::encoding::FACE_SAMPLE_FPS;
use obscura_models::{
    CaptionData, EncodingConfig, ExecutionMode, JobId, ProcessedVideoArtifact, ProcessingJob,
    ProcessingOptions, QualityTier, Stage, TRANSCRIPTION_UNAVAILABLE,
};

/// All collaborating services, injected explicitly.
pub struct OrchestratorParts {
    pub local_engine: Option<Arc<dyn ProcessingEngine>>,
    pub remote_engine: Option<Arc<dyn ProcessingEngine>>,
    pub detector: Option<Arc<dyn FaceDetector>>,
    pub inspector: Arc<dyn MediaInspector>,
    pub captions: Arc<CaptionService>,
    pub profiler: Arc<NetworkProfiler>,
    pub selector: QualitySelector,
    pub progress: Arc<ProgressHub>,
}

type DoneChannel = watch::Receiver<Option<PipelineResult<ProcessedVideoArtifact>>>;

struct InflightJob {
    generation: u64,
    done_rx: DoneChannel,
}

/// The processing orchestrator.
pub struct Orchestrator {
    config: PipelineConfig,
    parts: OrchestratorParts,
    inflight: Mutex<HashMap<PathBuf, InflightJob>>,
    generation: AtomicU64,
    job_slots: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, parts: OrchestratorParts) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            parts,
            inflight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            job_slots,
        }
    }

    /// Progress hub for subscribing to events.
    pub fn progress(&self) -> Arc<ProgressHub> {
        Arc::clone(&self.parts.progress)
    }

    /// Process a source recording into a finalized artifact.
    ///
    /// At most one job runs per source path: a concurrent duplicate call
    /// attaches to the running job and receives the same result.
    pub async fn process(
        &self,
        source_path: impl AsRef<Path>,
        options: ProcessingOptions,
    ) -> PipelineResult<ProcessedVideoArtifact> {
        let source = source_path.as_ref().to_path_buf();

        // Single-flight: attach to an existing job or register this one.
        // The lock is taken, the decision made, and the guard released inside
        // this block so it never lives across the `await` below.
        enum Flight {
            Attach(DoneChannel),
            Register(u64, watch::Sender<Option<PipelineResult<ProcessedVideoArtifact>>>),
        }
        let flight = {
            let mut inflight = self.lock_inflight();
            if let Some(existing) = inflight.get(&source) {
                Flight::Attach(existing.done_rx.clone())
            } else {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let (tx, rx) = watch::channel(None);
                inflight.insert(
                    source.clone(),
                    InflightJob {
                        generation,
                        done_rx: rx,
                    },
                );
                Flight::Register(generation, tx)
            }
        };
        let (generation, done_tx) = match flight {
            Flight::Attach(rx) => {
                debug!(source = ?source, "Attaching to in-flight job for source");
                return Self::await_existing(rx).await;
            }
            Flight::Register(generation, tx) => (generation, tx),
        };

        let mut job = ProcessingJob::new(&source, options.clone());
        let job_id = job.id.clone();
        let logger = JobLogger::new(&job_id, "video_processing");
        logger.log_start(&format!("source {}", source.display()));

        let _permit = self
            .job_slots
            .acquire()
            .await
            .map_err(|_| ProcessingError::internal(Stage::Prepare, "orchestrator shut down"))?;

        job.set_state(obscura_models::JobState::Running);
        let result = self.run_pipeline(&job_id, &source, &options).await;
        job.set_state(match &result {
            Ok(_) => obscura_models::JobState::Succeeded,
            Err(_) => obscura_models::JobState::Failed,
        });

        // Call-token check: a job abandoned mid-flight must not publish
        // its stale result.
        let still_current = {
            let mut inflight = self.lock_inflight();
            match inflight.get(&source) {
                Some(entry) if entry.generation == generation => {
                    inflight.remove(&source);
                    true
                }
                _ => false,
            }
        };

        self.parts.progress.finish(&job_id);

        if !still_current {
            warn!(job_id = %job_id, "Discarding result of superseded job");
            return Err(ProcessingError::abandoned(Stage::Finalize));
        }

        match &result {
            Ok(artifact) => {
                metrics::counter!("obscura_jobs_succeeded").increment(1);
                logger.log_completion(&format!("artifact {}", artifact.uri));
            }
            Err(e) => {
                metrics::counter!("obscura_jobs_failed").increment(1);
                logger.log_error(&format!("stage {}: {}", e.stage, e));
            }
        }

        let _ = done_tx.send(Some(result.clone()));
        result
    }

    /// Abandon any in-flight job for a source. The pipeline keeps running
    /// (external calls are not killed) but its result will be discarded.
    pub fn abandon(&self, source_path: impl AsRef<Path>) -> bool {
        let removed = self
            .lock_inflight()
            .remove(source_path.as_ref())
            .is_some();
        if removed {
            info!(source = ?source_path.as_ref(), "Abandoned in-flight job");
        }
        removed
    }

    /// Whether a job is currently in flight for a source.
    pub fn is_in_flight(&self, source_path: impl AsRef<Path>) -> bool {
        self.lock_inflight().contains_key(source_path.as_ref())
    }

    async fn await_existing(
        mut rx: DoneChannel,
    ) -> PipelineResult<ProcessedVideoArtifact> {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                return Err(ProcessingError::abandoned(Stage::Finalize));
            }
        }
    }

    async fn run_pipeline(
        &self,
        job_id: &JobId,
        source: &Path,
        options: &ProcessingOptions,
    ) -> PipelineResult<ProcessedVideoArtifact> {
        let progress = &self.parts.progress;
        progress.publish(job_id, 5, Stage::Prepare, "Preparing source");

        if !source.exists() {
            return Err(ProcessingError::malformed(
                Stage::Prepare,
                format!("source not found: {}", source.display()),
            ));
        }

        // Probe the source. A missing toolchain degrades; a bad file is
        // terminal.
        let info = match self.parts.inspector.inspect(source).await {
            Ok(info) => Some(info),
            Err(e) if e.is_toolchain_missing() => {
                warn!(error = %e, "Source probe unavailable, proceeding without media info");
                None
            }
            Err(e) => return Err(ProcessingError::from_media(Stage::Prepare, e)),
        };
        let duration = info.as_ref().map(|i| i.duration).unwrap_or(0.0);
        let (src_width, src_height) = info
            .as_ref()
            .map(|i| (i.width, i.height))
            .unwrap_or((0, 0));

        let tier = self.select_tier().await;
        progress.publish(
            job_id,
            10,
            Stage::Prepare,
            format!("Target quality {tier}"),
        );

        // Face anonymization pass
        let blur = if options.enable_face_blur {
            progress.publish(job_id, 15, Stage::FaceScan, "Scanning for faces");
            let spec = self.face_scan(source, src_width, src_height).await;
            progress.publish(job_id, 30, Stage::FaceScan, "Face scan complete");
            Some(spec)
        } else {
            None
        };

        // Transcription runs before caption compositing so caption timing
        // derives from real word boundaries. Failure degrades, never
        // aborts.
        let (caption_data, transcription) = if options.enable_transcription {
            progress.publish(job_id, 35, Stage::Transcription, "Transcribing speech");
            let outcome = self.acquire_captions(source).await;
            progress.publish(job_id, 50, Stage::Transcription, "Transcription complete");
            match outcome {
                Ok(data) => {
                    let text = data.full_text();
                    (Some(data), Some(text))
                }
                Err(e) => {
                    warn!(error = %e, "Transcription unavailable, captions skipped");
                    (None, Some(TRANSCRIPTION_UNAVAILABLE.to_string()))
                }
            }
        } else {
            (None, None)
        };

        // Combined filter graph, one render invocation
        let mut builder = FilterGraphBuilder::new();
        if let Some(spec) = blur {
            builder = builder.blur(spec);
        }
        if options.enable_voice_change {
            builder = builder.voice_effect(options.voice_effect);
        }
        if let Some(data) = &caption_data {
            builder = builder.captions(&data.segments);
        }
        if src_height == 0 || tier.height() < src_height {
            builder = builder.scale_to_height(tier.height());
        }
        if let Some(rate) = info.as_ref().and_then(|i| i.audio_sample_rate) {
            builder = builder.sample_rate(rate);
        }
        let graph = builder.build();

        let output = self.output_path(source, tier)?;
        let plan = RenderPlan {
            source: source.to_path_buf(),
            output,
            graph,
            encoding: EncodingConfig::for_quality(options.quality),
            duration,
        };

        progress.publish(job_id, 50, Stage::Render, "Rendering");
        match self.render_with_fallback(job_id, &plan, options.mode).await {
            Ok(engine) => {
                progress.publish(
                    job_id,
                    85,
                    Stage::Render,
                    format!("Render complete ({} engine)", engine.as_str()),
                );
                self.finalize(job_id, &plan, info.as_ref(), options, transcription)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "All engines failed, falling back to unmodified source");
                self.degraded_artifact(job_id, source, info.as_ref(), options, transcription)
            }
        }
    }

    /// Run the detection pass, absorbing detector failures into the
    /// conservative policy fallback: prefer over-blurring to leaking
    /// identity.
    async fn face_scan(&self, source: &Path, width: u32, height: u32) -> BlurSpec {
        let Some(detector) = &self.parts.detector else {
            debug!("No face detector available, blurring top half");
            return BlurSpec::TopHalf;
        };

        match scan_for_faces(source, width, height, Arc::clone(detector), FACE_SAMPLE_FPS).await {
            Ok(scan) => match scan.region {
                Some(region) => {
                    debug!(
                        detections = scan.detections,
                        frames = scan.frames_scanned,
                        "Merged face region"
                    );
                    BlurSpec::Region(region)
                }
                None => {
                    info!(
                        frames = scan.frames_scanned,
                        "No faces detected, applying top-half policy fallback"
                    );
                    BlurSpec::TopHalf
                }
            },
            Err(e) => {
                warn!(error = %e, "Face scan failed, applying top-half policy fallback");
                BlurSpec::TopHalf
            }
        }
    }

    /// Fetch captions, serving the sidecar cache first. When audio
    /// isolation is impossible (no local toolchain) the source container
    /// goes to the provider directly.
    async fn acquire_captions(&self, source: &Path) -> Result<CaptionData, CaptionError> {
        match self
            .parts
            .captions
            .generate_captions_for_video(source, false)
            .await
        {
            Ok(data) => Ok(data),
            Err(CaptionError::Media(e)) => {
                debug!(error = %e, "Audio isolation unavailable, sending container to provider");
                self.parts
                    .captions
                    .generate_from_audio(source, source, false)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn select_tier(&self) -> QualityTier {
        let profile = match self.parts.profiler.current() {
            Some(profile) => Some(profile),
            None => {
                let retry = RetryConfig::new("network_measurement").with_max_retries(1);
                retry_async(&retry, |_| true, || {
                    self.parts.profiler.measure_network_condition()
                })
                .await
                .ok()
            }
        };

        match profile {
            Some(profile) => self.parts.selector.select(&profile),
            None => {
                // No measurement at all: let the device half of the score
                // decide alone.
                debug!("No network profile available, selecting tier from device only");
                obscura_delivery::select_tier(0.0, self.parts.selector.device().score())
            }
        }
    }

    /// Try engines in mode order; hybrid retries once remotely after a
    /// local failure.
    async fn render_with_fallback(
        &self,
        job_id: &JobId,
        plan: &RenderPlan,
        mode: ExecutionMode,
    ) -> PipelineResult<EngineKind> {
        let local = match &self.parts.local_engine {
            Some(engine) if engine.is_available().await => Some(Arc::clone(engine)),
            _ => None,
        };
        let remote = self.parts.remote_engine.as_ref().map(Arc::clone);

        let mut chain: Vec<Arc<dyn ProcessingEngine>> = Vec::new();
        match mode {
            ExecutionMode::Server => {
                chain.extend(remote);
            }
            ExecutionMode::Local => match local {
                Some(local) => chain.push(local),
                None => {
                    // Local toolchain missing: route to the remote engine
                    debug!("Local engine unavailable, routing to remote");
                    chain.extend(remote);
                }
            },
            ExecutionMode::Hybrid => {
                chain.extend(local);
                chain.extend(remote);
            }
        }

        if chain.is_empty() {
            return Err(ProcessingError::engine_unavailable(
                Stage::Render,
                format!("no engine available for mode {}", mode.as_str()),
            ));
        }

        let mut last_error: Option<ProcessingError> = None;
        for engine in chain {
            let kind = engine.kind();
            if kind == EngineKind::Remote && !engine.is_available().await {
                last_error = Some(ProcessingError::engine_unavailable(
                    Stage::Render,
                    "remote engine unreachable",
                ));
                continue;
            }

            let callback = self.render_progress_callback(job_id.clone());
            match engine.render(plan, callback).await {
                Ok(()) => return Ok(kind),
                Err(e) => {
                    warn!(engine = kind.as_str(), error = %e, "Engine render failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProcessingError::engine_unavailable(Stage::Render, "no engine attempted the render")
        }))
    }

    /// Map engine-internal 0-100 progress into the 50-85 render window.
    fn render_progress_callback(&self, job_id: JobId) -> RenderProgressFn {
        let progress = Arc::clone(&self.parts.progress);
        Arc::new(move |engine_percent: u8| {
            let overall = 50 + (engine_percent.min(100) as u16 * 35 / 100) as u8;
            progress.publish(&job_id, overall, Stage::Render, "Rendering");
        })
    }

    async fn finalize(
        &self,
        job_id: &JobId,
        plan: &RenderPlan,
        source_info: Option<&VideoInfo>,
        options: &ProcessingOptions,
        transcription: Option<String>,
    ) -> PipelineResult<ProcessedVideoArtifact> {
        let progress = &self.parts.progress;
        progress.publish(job_id, 85, Stage::Finalize, "Extracting thumbnail");

        let thumbnail_uri = {
            let thumb_path = obscura_media::thumbnail_path_for(&plan.output);
            match self.parts.inspector.thumbnail(&plan.output, &thumb_path).await {
                Ok(()) => Some(thumb_path.to_string_lossy().to_string()),
                Err(e) => {
                    warn!(error = %e, "Thumbnail extraction failed");
                    None
                }
            }
        };

        progress.publish(job_id, 95, Stage::Finalize, "Finalizing artifact");

        // Output facts, falling back to the source probe where the output
        // cannot be inspected.
        let out_info = self.parts.inspector.inspect(&plan.output).await.ok();
        let size = match &out_info {
            Some(info) if info.size > 0 => info.size,
            _ => tokio::fs::metadata(&plan.output)
                .await
                .map(|m| m.len())
                .unwrap_or(0),
        };
        let (width, height) = out_info
            .as_ref()
            .map(|i| (i.width, i.height))
            .or_else(|| source_info.map(|i| (i.width, i.height)))
            .unwrap_or((0, 0));
        let duration = out_info
            .as_ref()
            .map(|i| i.duration)
            .filter(|d| *d > 0.0)
            .unwrap_or(plan.duration);

        let artifact = ProcessedVideoArtifact {
            uri: plan.output.to_string_lossy().to_string(),
            width,
            height,
            duration,
            size,
            transcription,
            thumbnail_uri,
            face_blur_applied: options.enable_face_blur,
            voice_change_applied: options.enable_voice_change,
        };

        progress.publish(job_id, 100, Stage::Finalize, "Processing complete");
        Ok(artifact)
    }

    /// Final fallback: a degraded artifact over the unmodified source, so
    /// the caller's flow completes instead of aborting. Flags reflect what
    /// was requested for UI honesty.
    fn degraded_artifact(
        &self,
        job_id: &JobId,
        source: &Path,
        source_info: Option<&VideoInfo>,
        options: &ProcessingOptions,
        transcription: Option<String>,
    ) -> PipelineResult<ProcessedVideoArtifact> {
        let size = source_info
            .map(|i| i.size)
            .or_else(|| std::fs::metadata(source).map(|m| m.len()).ok())
            .unwrap_or(0);

        let artifact = ProcessedVideoArtifact {
            uri: source.to_string_lossy().to_string(),
            width: source_info.map(|i| i.width).unwrap_or(0),
            height: source_info.map(|i| i.height).unwrap_or(0),
            duration: source_info.map(|i| i.duration).unwrap_or(0.0),
            size,
            transcription: transcription.or_else(|| {
                options
                    .enable_transcription
                    .then(|| TRANSCRIPTION_UNAVAILABLE.to_string())
            }),
            thumbnail_uri: None,
            face_blur_applied: options.enable_face_blur,
            voice_change_applied: options.enable_voice_change,
        };

        self.parts.progress.publish(
            job_id,
            100,
            Stage::Finalize,
            "Completed with degraded output",
        );
        Ok(artifact)
    }

    fn output_path(&self, source: &Path, tier: QualityTier) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)
            .map_err(|e| ProcessingError::internal(Stage::Prepare, e.to_string()))?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        Ok(self
            .config
            .output_dir
            .join(format!("{stem}-anon-{tier}.mp4")))
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, InflightJob>> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
