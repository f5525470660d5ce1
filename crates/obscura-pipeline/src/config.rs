//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum distinct processing jobs running concurrently
    pub max_concurrent_jobs: usize,
    /// Hard timeout for one render invocation
    pub render_timeout: Duration,
    /// Directory for processed artifacts
    pub output_dir: PathBuf,
    /// Network sampling interval for the profiler
    pub network_sample_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            render_timeout: Duration::from_secs(1800),
            output_dir: std::env::temp_dir().join("obscura-out"),
            network_sample_interval: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("OBSCURA_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            render_timeout: Duration::from_secs(
                std::env::var("OBSCURA_RENDER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1800),
            ),
            output_dir: std::env::var("OBSCURA_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            network_sample_interval: Duration::from_secs(
                std::env::var("OBSCURA_NETWORK_SAMPLE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}
