//! Progress event hub.
//!
//! One typed broadcast stream replaces nested callback parameters: the
//! orchestrator publishes, any consumer (UI, logs, tests) subscribes.
//! Published percentages are monotonically non-decreasing per job.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use obscura_models::{JobId, ProgressEvent, Stage};

/// Broadcast hub for progress events.
pub struct ProgressHub {
    tx: broadcast::Sender<ProgressEvent>,
    last_percent: Mutex<HashMap<JobId, u8>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            tx,
            last_percent: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a progress event. Regressions are clamped to the job's
    /// previous percentage so consumers never see progress move backward.
    pub fn publish(&self, job_id: &JobId, percent: u8, stage: Stage, message: impl Into<String>) {
        let percent = {
            let mut last = self.lock_last();
            let entry = last.entry(job_id.clone()).or_insert(0);
            *entry = (*entry).max(percent.min(100));
            *entry
        };

        let event = ProgressEvent::new(job_id.clone(), percent, stage, message);
        debug!(
            job_id = %event.job_id,
            percent = event.percent,
            stage = stage.as_str(),
            "{}",
            event.message
        );
        // Send fails only when nobody subscribes, which is fine.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all jobs' events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Drop per-job tracking once a job is terminal.
    pub fn finish(&self, job_id: &JobId) {
        self.lock_last().remove(job_id);
    }

    fn lock_last(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, u8>> {
        self.last_percent.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe();
        let job = JobId::new();

        hub.publish(&job, 30, Stage::FaceScan, "scanning");
        hub.publish(&job, 15, Stage::FaceScan, "stale");
        hub.publish(&job, 50, Stage::Transcription, "transcribing");

        assert_eq!(rx.recv().await.unwrap().percent, 30);
        assert_eq!(rx.recv().await.unwrap().percent, 30);
        assert_eq!(rx.recv().await.unwrap().percent, 50);
    }

    #[tokio::test]
    async fn test_jobs_are_tracked_independently() {
        let hub = ProgressHub::new();
        let mut rx = hub.subscribe();
        let a = JobId::new();
        let b = JobId::new();

        hub.publish(&a, 80, Stage::Render, "almost");
        hub.publish(&b, 5, Stage::Prepare, "starting");

        assert_eq!(rx.recv().await.unwrap().percent, 80);
        assert_eq!(rx.recv().await.unwrap().percent, 5);
    }
}
