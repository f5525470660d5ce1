//! The in-process priority queue.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use crate::error::{QueueError, QueueResult};
use crate::job::{BackgroundJob, JobKind, JobPriority, QueueJobId};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Fixed worker pool size; `processing` can never exceed this
    pub workers: usize,
    /// Max retry attempts before a failure is terminal
    pub max_retries: u32,
    /// Base delay for retry backoff (doubles per attempt)
    pub base_backoff: Duration,
    /// Cap on the retry backoff
    pub max_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: std::env::var("OBSCURA_QUEUE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.workers),
            max_retries: std::env::var("OBSCURA_QUEUE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_backoff: Duration::from_millis(
                std::env::var("OBSCURA_QUEUE_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
            max_backoff: defaults.max_backoff,
        }
    }

    /// Backoff before retry attempt `attempt` (1-based).
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        delay.min(self.max_backoff)
    }
}

/// Observable queue counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs waiting in the heap
    pub pending: usize,
    /// Jobs currently held by a worker
    pub processing: usize,
    /// Jobs finished successfully over the queue's lifetime
    pub completed: u64,
    /// Jobs that failed terminally over the queue's lifetime
    pub failed: u64,
}

/// Heap entry: higher priority first, FIFO within a priority.
struct PendingJob {
    job: BackgroundJob,
    seq: u64,
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.seq == other.seq
    }
}

impl Eq for PendingJob {}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        self.job
            .priority
            .cmp(&other.job.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    heap: BinaryHeap<PendingJob>,
    inflight_keys: HashSet<String>,
    shut_down: bool,
}

/// Priority background job queue.
///
/// Explicitly constructed, dependency-injected, and drained independently
/// of any single processing job's lifecycle.
pub struct BackgroundQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
    seq: AtomicU64,
    processing: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl BackgroundQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            processing: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Enqueue a job. A second job with the same kind and payload is
    /// rejected while the first is queued or running.
    pub fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        priority: JobPriority,
    ) -> QueueResult<QueueJobId> {
        let job = BackgroundJob::new(kind, payload, priority);
        let key = job.single_flight_key();
        let id = job.id.clone();

        {
            let mut state = self.lock_state();
            if state.shut_down {
                return Err(QueueError::ShutDown);
            }
            if !state.inflight_keys.insert(key.clone()) {
                return Err(QueueError::Duplicate(key));
            }
            let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
            state.heap.push(PendingJob { job, seq });
        }

        metrics::counter!("obscura_queue_enqueued").increment(1);
        debug!(job_id = %id, kind = kind.as_str(), priority = priority.as_str(), "Enqueued background job");
        self.notify.notify_one();
        Ok(id)
    }

    /// Requeue a job for retry; the single-flight key stays held.
    pub(crate) fn requeue(&self, job: BackgroundJob) {
        {
            let mut state = self.lock_state();
            if state.shut_down {
                // Dropped on shutdown; key released so a restart can run it
                state.inflight_keys.remove(&job.single_flight_key());
                return;
            }
            let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
            state.heap.push(PendingJob { job, seq });
        }
        self.notify.notify_one();
    }

    /// Pop the highest-priority job, if any.
    pub(crate) fn try_pop(&self) -> Option<BackgroundJob> {
        self.lock_state().heap.pop().map(|p| p.job)
    }

    /// Wait until a job may be available.
    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }

    /// Release a job's single-flight key on terminal completion.
    pub(crate) fn release_key(&self, job: &BackgroundJob) {
        self.lock_state().inflight_keys.remove(&job.single_flight_key());
    }

    pub(crate) fn mark_processing_start(&self) {
        self.processing.fetch_add(1, AtomicOrdering::SeqCst);
        metrics::gauge!("obscura_queue_processing")
            .set(self.processing.load(AtomicOrdering::SeqCst) as f64);
    }

    pub(crate) fn mark_processing_end(&self) {
        self.processing.fetch_sub(1, AtomicOrdering::SeqCst);
        metrics::gauge!("obscura_queue_processing")
            .set(self.processing.load(AtomicOrdering::SeqCst) as f64);
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.fetch_add(1, AtomicOrdering::SeqCst);
        metrics::counter!("obscura_queue_completed").increment(1);
    }

    pub(crate) fn mark_failed_terminal(&self) {
        self.failed.fetch_add(1, AtomicOrdering::SeqCst);
        metrics::counter!("obscura_queue_failed").increment(1);
    }

    /// Refuse new work; queued jobs drain, waiting workers wake.
    pub(crate) fn mark_shut_down(&self) {
        self.lock_state().shut_down = true;
        self.notify.notify_waiters();
    }

    /// Queue depth and lifetime counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.lock_state().heap.len(),
            processing: self.processing.load(AtomicOrdering::SeqCst),
            completed: self.completed.load(AtomicOrdering::SeqCst),
            failed: self.failed.load(AtomicOrdering::SeqCst),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_then_fifo_ordering() {
        let queue = BackgroundQueue::new(QueueConfig::default());
        queue
            .enqueue(JobKind::CacheOptimization, serde_json::json!({"n": 1}), JobPriority::Low)
            .unwrap();
        queue
            .enqueue(JobKind::VideoPreloading, serde_json::json!({"n": 2}), JobPriority::High)
            .unwrap();
        queue
            .enqueue(JobKind::VideoPreloading, serde_json::json!({"n": 3}), JobPriority::High)
            .unwrap();
        queue
            .enqueue(JobKind::QualityVariantGeneration, serde_json::json!({"n": 4}), JobPriority::Normal)
            .unwrap();

        let order: Vec<i64> = std::iter::from_fn(|| queue.try_pop())
            .map(|j| j.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_duplicate_rejected_while_in_flight() {
        let queue = BackgroundQueue::new(QueueConfig::default());
        let payload = serde_json::json!({"uri": "a.mp4"});

        queue
            .enqueue(JobKind::VideoPreloading, payload.clone(), JobPriority::Normal)
            .unwrap();
        let err = queue
            .enqueue(JobKind::VideoPreloading, payload.clone(), JobPriority::Normal)
            .unwrap_err();
        assert!(matches!(err, QueueError::Duplicate(_)));

        // Completing the job releases the key
        let job = queue.try_pop().unwrap();
        queue.release_key(&job);
        queue
            .enqueue(JobKind::VideoPreloading, payload, JobPriority::Normal)
            .unwrap();
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = QueueConfig::default();
        assert_eq!(config.backoff_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(2));
        assert!(config.backoff_for_attempt(20) <= Duration::from_secs(30));
    }

    #[test]
    fn test_stats_reflect_enqueue() {
        let queue = BackgroundQueue::new(QueueConfig::default());
        assert_eq!(queue.stats().pending, 0);
        queue
            .enqueue(JobKind::CacheOptimization, serde_json::json!({}), JobPriority::Low)
            .unwrap();
        let stats = queue.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.completed, 0);
    }
}
