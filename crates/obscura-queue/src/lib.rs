//! In-process priority background job queue.
//!
//! Long-running work (cache optimization, quality-variant generation,
//! preloading) runs off the critical path on a fixed worker pool. Jobs are
//! single-flight per kind and payload, retried with exponential backoff,
//! and observable through [`QueueStats`].

pub mod error;
pub mod executor;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use executor::{JobHandler, QueueExecutor};
pub use job::{BackgroundJob, JobKind, JobPriority, QueueJobId};
pub use queue::{BackgroundQueue, QueueConfig, QueueStats};
