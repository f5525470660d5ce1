//! Adaptive delivery subsystem.
//!
//! Network profiling, quality-tier selection, and the on-device artifact
//! cache. All services here are explicitly constructed and dependency-
//! injected, with `init`/`shutdown` lifecycles; background timers never
//! block the orchestrator.

pub mod cache;
pub mod device;
pub mod error;
pub mod profiler;
pub mod selector;

pub use cache::{store_bytes, CacheConfig, CacheEntry, CacheManager, CacheStats};
pub use device::{device_tier, memory_pressure_ratio};
pub use error::{DeliveryError, DeliveryResult};
pub use profiler::{HttpProbe, NetworkProbe, NetworkProfiler, StaticProbe};
pub use selector::{select_tier, QualitySelector};
