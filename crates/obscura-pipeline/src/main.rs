//! Obscura processing worker binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use obscura_captions::{CaptionService, CloudSpeechProvider, SimulatedProvider, TranscriptionProvider};
use obscura_delivery::{
    CacheConfig, CacheManager, HttpProbe, NetworkProfiler, QualitySelector,
};
use obscura_models::ProcessingOptions;
use obscura_pipeline::{
    register_handlers, FfprobeInspector, LocalEngine, Orchestrator, OrchestratorParts,
    PipelineConfig, ProcessingEngine, ProgressHub, RemoteEngine,
};
use obscura_queue::{BackgroundQueue, QueueConfig, QueueExecutor};
use obscura_remote::RemoteClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = PrometheusBuilder::new().install_recorder() {
        error!("Failed to install metrics recorder: {}", e);
    }

    info!("Starting obscura-worker");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    // Adaptive delivery services
    let profiler = Arc::new(NetworkProfiler::new(
        Arc::new(HttpProbe::from_env()?),
        config.network_sample_interval,
    ));
    let profiler_task = profiler.start();

    let cache = Arc::new(CacheManager::new(CacheConfig::from_env()));
    cache.init().await?;
    let pressure_task = cache.start_pressure_monitor();

    // Engines
    let local_engine: Arc<dyn ProcessingEngine> =
        Arc::new(LocalEngine::new(config.render_timeout.as_secs()));
    let remote_engine: Arc<dyn ProcessingEngine> =
        Arc::new(RemoteEngine::new(Arc::new(RemoteClient::from_env()?)));

    // Background job queue
    let queue = Arc::new(BackgroundQueue::new(QueueConfig::from_env()));
    let mut executor = QueueExecutor::new(Arc::clone(&queue));
    register_handlers(&mut executor, Arc::clone(&cache), Arc::clone(&local_engine));
    executor.start();

    // Transcription provider: cloud when configured, simulated otherwise
    let cloud = CloudSpeechProvider::from_env()?;
    let provider: Arc<dyn TranscriptionProvider> = if cloud.is_configured() {
        Arc::new(cloud)
    } else {
        info!("No cloud speech provider configured, using simulated transcription");
        Arc::new(SimulatedProvider::new(30.0))
    };
    let captions = Arc::new(CaptionService::new(provider));

    let orchestrator = Orchestrator::new(
        config,
        OrchestratorParts {
            local_engine: Some(local_engine),
            remote_engine: Some(remote_engine),
            detector: obscura_media::local_detector(),
            inspector: Arc::new(FfprobeInspector),
            captions,
            profiler: Arc::clone(&profiler),
            selector: QualitySelector::for_this_device(),
            progress: Arc::new(ProgressHub::new()),
        },
    );

    // Mirror progress events into the log
    let mut progress_rx = orchestrator.progress().subscribe();
    let progress_task = tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            info!(
                job_id = %event.job_id,
                percent = event.percent,
                stage = event.stage.as_str(),
                "{}",
                event.message
            );
        }
    });

    let source = std::env::args().nth(1);
    match source {
        Some(source) => {
            let options = ProcessingOptions {
                enable_transcription: true,
                ..Default::default()
            };
            let artifact = orchestrator.process(&source, options).await?;
            println!("{}", serde_json::to_string_pretty(&artifact)?);
        }
        None => {
            info!("No source given; serving background queue until ctrl-c");
            tokio::signal::ctrl_c().await?;
        }
    }

    info!("Shutting down");
    profiler.shutdown();
    cache.shutdown();
    executor.shutdown().await;
    progress_task.abort();
    let _ = profiler_task.await;
    let _ = pressure_task.await;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,obscura=debug"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
