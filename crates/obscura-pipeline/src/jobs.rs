//! Background job handlers.
//!
//! Wires the queue's job kinds to the delivery subsystem and the engines.
//! These run off the critical path; a processing job never waits on them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::{ProcessingEngine, RenderPlan};
use obscura_delivery::{store_bytes, CacheManager};
use obscura_media::FilterGraphBuilder;
use obscura_models::EncodingConfig;
use obscura_queue::{BackgroundJob, JobHandler, JobKind, QueueError, QueueExecutor, QueueResult};

/// Payload for quality-variant pre-generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityVariantPayload {
    /// Path of the processed artifact to derive a variant from
    pub source_uri: String,
    /// Target output height
    pub target_height: u32,
}

/// Payload for preloading media into the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadPayload {
    /// Where to fetch from
    pub url: String,
    /// Cache key to store under
    pub key: String,
}

/// Trims the cache toward its budget.
pub struct CacheOptimizationHandler {
    cache: Arc<CacheManager>,
}

impl CacheOptimizationHandler {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl JobHandler for CacheOptimizationHandler {
    async fn handle(&self, _job: &BackgroundJob) -> QueueResult<()> {
        self.cache.force_cleanup();
        debug!(stats = ?self.cache.stats(), "Cache optimization pass complete");
        Ok(())
    }
}

/// Pre-renders a quality variant of a processed artifact into the cache.
pub struct QualityVariantHandler {
    cache: Arc<CacheManager>,
    engine: Arc<dyn ProcessingEngine>,
}

impl QualityVariantHandler {
    pub fn new(cache: Arc<CacheManager>, engine: Arc<dyn ProcessingEngine>) -> Self {
        Self { cache, engine }
    }
}

#[async_trait]
impl JobHandler for QualityVariantHandler {
    async fn handle(&self, job: &BackgroundJob) -> QueueResult<()> {
        let payload: QualityVariantPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| QueueError::terminal(format!("bad variant payload: {e}")))?;

        let source = PathBuf::from(&payload.source_uri);
        if !source.exists() {
            return Err(QueueError::terminal(format!(
                "variant source missing: {}",
                source.display()
            )));
        }

        let key = format!("{}@{}p", payload.source_uri, payload.target_height);
        if self.cache.contains(&key) {
            debug!(key, "Variant already cached");
            return Ok(());
        }

        let graph = FilterGraphBuilder::new()
            .scale_to_height(payload.target_height)
            .build();
        let plan = RenderPlan {
            source,
            output: self.cache.path_for(&key),
            graph,
            encoding: EncodingConfig::default(),
            duration: 0.0,
        };

        self.engine
            .render(&plan, Arc::new(|_| {}))
            .await
            .map_err(|e| {
                if e.retryable() {
                    QueueError::retryable(e.to_string())
                } else {
                    QueueError::terminal(e.to_string())
                }
            })?;

        self.cache
            .insert(&key)
            .map_err(|e| QueueError::terminal(e.to_string()))?;

        info!(key, "Quality variant generated");
        Ok(())
    }
}

/// Fetches media bytes into the cache ahead of playback.
pub struct VideoPreloadHandler {
    cache: Arc<CacheManager>,
    http: reqwest::Client,
}

impl VideoPreloadHandler {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self {
            cache,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl JobHandler for VideoPreloadHandler {
    async fn handle(&self, job: &BackgroundJob) -> QueueResult<()> {
        let payload: PreloadPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| QueueError::terminal(format!("bad preload payload: {e}")))?;

        if self.cache.contains(&payload.key) {
            debug!(key = payload.key, "Preload target already cached");
            return Ok(());
        }

        let response = self
            .http
            .get(&payload.url)
            .send()
            .await
            .map_err(|e| QueueError::retryable(format!("preload fetch failed: {e}")))?;

        if !response.status().is_success() {
            return Err(QueueError::terminal(format!(
                "preload fetch returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| QueueError::retryable(format!("preload read failed: {e}")))?;

        store_bytes(&self.cache, &payload.key, &bytes)
            .await
            .map_err(|e| QueueError::terminal(e.to_string()))?;

        info!(key = payload.key, bytes = bytes.len(), "Preloaded into cache");
        Ok(())
    }
}

/// Register the standard handlers on an executor.
pub fn register_handlers(
    executor: &mut QueueExecutor,
    cache: Arc<CacheManager>,
    engine: Arc<dyn ProcessingEngine>,
) {
    executor.register_handler(
        JobKind::CacheOptimization,
        Arc::new(CacheOptimizationHandler::new(Arc::clone(&cache))),
    );
    executor.register_handler(
        JobKind::QualityVariantGeneration,
        Arc::new(QualityVariantHandler::new(Arc::clone(&cache), engine)),
    );
    executor.register_handler(
        JobKind::VideoPreloading,
        Arc::new(VideoPreloadHandler::new(cache)),
    );
}
