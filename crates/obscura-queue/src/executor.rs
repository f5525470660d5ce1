//! Worker pool draining the background queue.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{BackgroundJob, JobKind};
use crate::queue::BackgroundQueue;

/// Executes one kind of background job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &BackgroundJob) -> QueueResult<()>;
}

/// Fixed-size worker pool over a [`BackgroundQueue`].
///
/// State machine per job: queued → running → completed, or
/// failed-retryable → queued again with backoff, or failed-terminal,
/// which is logged and counted, never silently dropped.
pub struct QueueExecutor {
    queue: Arc<BackgroundQueue>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl QueueExecutor {
    pub fn new(queue: Arc<BackgroundQueue>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            handlers: HashMap::new(),
            shutdown,
            workers: Vec::new(),
        }
    }

    /// Register the handler for one job kind.
    pub fn register_handler(&mut self, kind: JobKind, handler: Arc<dyn JobHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Spawn the worker pool.
    pub fn start(&mut self) {
        let worker_count = self.queue.config().workers;
        info!(workers = worker_count, "Starting background queue workers");

        let handlers = Arc::new(self.handlers.clone());
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&self.queue);
            let handlers = Arc::clone(&handlers);
            let mut shutdown_rx = self.shutdown.subscribe();

            self.workers.push(tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                debug!(worker_id, "Queue worker stopping");
                                break;
                            }
                            continue;
                        }
                        job = wait_for_job(&queue) => job,
                    };

                    Self::run_job(&queue, &handlers, job).await;
                }
            }));
        }
    }

    async fn run_job(
        queue: &Arc<BackgroundQueue>,
        handlers: &HashMap<JobKind, Arc<dyn JobHandler>>,
        mut job: BackgroundJob,
    ) {
        queue.mark_processing_start();
        job.attempts += 1;

        let result = match handlers.get(&job.kind) {
            Some(handler) => handler.handle(&job).await,
            None => Err(QueueError::NoHandler(job.kind.to_string())),
        };

        queue.mark_processing_end();

        match result {
            Ok(()) => {
                debug!(job_id = %job.id, kind = job.kind.as_str(), "Background job completed");
                queue.mark_completed();
                queue.release_key(&job);
            }
            Err(e) if e.is_retryable() && job.attempts <= queue.config().max_retries => {
                let backoff = queue.config().backoff_for_attempt(job.attempts);
                warn!(
                    job_id = %job.id,
                    kind = job.kind.as_str(),
                    attempt = job.attempts,
                    backoff = ?backoff,
                    error = %e,
                    "Background job failed, retrying"
                );

                // Backoff runs off-worker so the slot frees immediately;
                // the single-flight key stays held until terminal.
                let queue = Arc::clone(queue);
                tokio::spawn(async move {
                    tokio::time::sleep(backoff).await;
                    queue.requeue(job);
                });
            }
            Err(e) => {
                error!(
                    job_id = %job.id,
                    kind = job.kind.as_str(),
                    attempts = job.attempts,
                    error = %e,
                    "Background job failed terminally"
                );
                queue.mark_failed_terminal();
                queue.release_key(&job);
            }
        }
    }

    /// Stop accepting work and wait for workers to finish their current
    /// jobs.
    pub async fn shutdown(&mut self) {
        self.queue.mark_shut_down();
        let _ = self.shutdown.send(true);
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
        info!("Background queue workers stopped");
    }
}

async fn wait_for_job(queue: &Arc<BackgroundQueue>) -> BackgroundJob {
    loop {
        if let Some(job) = queue.try_pop() {
            return job;
        }
        queue.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobPriority;
    use crate::queue::QueueConfig;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    struct RecordingHandler {
        current: AtomicUsize,
        max_concurrent: AtomicUsize,
        handled: AtomicU32,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                max_concurrent: AtomicUsize::new(0),
                handled: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, _job: &BackgroundJob) -> QueueResult<()> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyHandler {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &BackgroundJob) -> QueueResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(QueueError::retryable("transient"))
            } else {
                Ok(())
            }
        }
    }

    struct DoomedHandler;

    #[async_trait]
    impl JobHandler for DoomedHandler {
        async fn handle(&self, _job: &BackgroundJob) -> QueueResult<()> {
            Err(QueueError::terminal("malformed payload"))
        }
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_processing_never_exceeds_worker_cap() {
        let queue = Arc::new(BackgroundQueue::new(QueueConfig {
            workers: 2,
            ..Default::default()
        }));
        let handler = Arc::new(RecordingHandler::new());

        let mut executor = QueueExecutor::new(Arc::clone(&queue));
        executor.register_handler(JobKind::VideoPreloading, handler.clone());
        executor.start();

        for i in 0..8 {
            queue
                .enqueue(
                    JobKind::VideoPreloading,
                    serde_json::json!({"n": i}),
                    JobPriority::Normal,
                )
                .unwrap();
        }

        wait_until(|| handler.handled.load(Ordering::SeqCst) == 8).await;
        assert!(handler.max_concurrent.load(Ordering::SeqCst) <= 2);
        assert_eq!(queue.stats().completed, 8);
        assert_eq!(queue.stats().processing, 0);

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_completed_is_monotonic() {
        let queue = Arc::new(BackgroundQueue::new(QueueConfig {
            workers: 1,
            ..Default::default()
        }));
        let handler = Arc::new(RecordingHandler::new());

        let mut executor = QueueExecutor::new(Arc::clone(&queue));
        executor.register_handler(JobKind::CacheOptimization, handler.clone());
        executor.start();

        let mut last_completed = 0;
        for i in 0..4 {
            queue
                .enqueue(
                    JobKind::CacheOptimization,
                    serde_json::json!({"round": i}),
                    JobPriority::Low,
                )
                .unwrap();
            wait_until(|| queue.stats().completed == i + 1).await;
            let completed = queue.stats().completed;
            assert!(completed >= last_completed);
            last_completed = completed;
        }

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_retryable_failure_requeues_with_backoff() {
        let queue = Arc::new(BackgroundQueue::new(QueueConfig {
            workers: 1,
            max_retries: 3,
            base_backoff: Duration::from_millis(5),
            ..Default::default()
        }));
        let handler = Arc::new(FlakyHandler {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });

        let mut executor = QueueExecutor::new(Arc::clone(&queue));
        executor.register_handler(JobKind::QualityVariantGeneration, handler.clone());
        executor.start();

        queue
            .enqueue(
                JobKind::QualityVariantGeneration,
                serde_json::json!({"uri": "x"}),
                JobPriority::High,
            )
            .unwrap();

        wait_until(|| queue.stats().completed == 1).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        // Retried attempts are not terminal failures
        assert_eq!(queue.stats().failed, 0);

        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_terminal_failure_releases_single_flight() {
        let queue = Arc::new(BackgroundQueue::new(QueueConfig {
            workers: 1,
            ..Default::default()
        }));

        let mut executor = QueueExecutor::new(Arc::clone(&queue));
        executor.register_handler(JobKind::VideoPreloading, Arc::new(DoomedHandler));
        executor.start();

        let payload = serde_json::json!({"uri": "bad.mp4"});
        queue
            .enqueue(JobKind::VideoPreloading, payload.clone(), JobPriority::Normal)
            .unwrap();

        wait_until(|| queue.stats().failed >= 1).await;
        wait_until(|| {
            queue
                .enqueue(JobKind::VideoPreloading, payload.clone(), JobPriority::Normal)
                .is_ok()
        })
        .await;

        executor.shutdown().await;
    }
}
