//! Network profiling.
//!
//! An injectable probe takes the raw measurement; the profiler classifies
//! it, publishes transitions on a watch channel, and re-samples on a timer
//! so quality upgrades and downgrades happen without caller involvement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, DeliveryResult};
use obscura_models::NetworkProfile;

/// Raw bandwidth/latency measurement source.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Measure (bandwidth in Mbps, round-trip latency in ms).
    async fn measure(&self) -> DeliveryResult<(f64, f64)>;
}

/// HTTP-based probe: a HEAD request times latency, a ranged GET times
/// bandwidth over a small fixed payload.
pub struct HttpProbe {
    http: Client,
    probe_url: String,
    sample_bytes: u64,
}

impl HttpProbe {
    pub fn new(probe_url: impl Into<String>) -> DeliveryResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            probe_url: probe_url.into(),
            sample_bytes: 256 * 1024,
        })
    }

    /// Create from `OBSCURA_PROBE_URL`.
    pub fn from_env() -> DeliveryResult<Self> {
        let url = std::env::var("OBSCURA_PROBE_URL")
            .unwrap_or_else(|_| "https://speed.cloudflare.com/__down?bytes=262144".to_string());
        Self::new(url)
    }
}

#[async_trait]
impl NetworkProbe for HttpProbe {
    async fn measure(&self) -> DeliveryResult<(f64, f64)> {
        // Latency: HEAD round trip
        let start = Instant::now();
        self.http.head(&self.probe_url).send().await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        // Bandwidth: timed ranged download
        let start = Instant::now();
        let response = self
            .http
            .get(&self.probe_url)
            .header("range", format!("bytes=0-{}", self.sample_bytes - 1))
            .send()
            .await?;
        let bytes = response.bytes().await?;
        let elapsed = start.elapsed().as_secs_f64();

        if bytes.is_empty() || elapsed <= 0.0 {
            return Err(DeliveryError::probe("empty bandwidth sample"));
        }

        let bandwidth_mbps = (bytes.len() as f64 * 8.0) / elapsed / 1_000_000.0;
        Ok((bandwidth_mbps, latency_ms))
    }
}

/// Fixed-value probe for tests and simulated conditions.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    pub bandwidth_mbps: f64,
    pub latency_ms: f64,
}

impl StaticProbe {
    pub fn new(bandwidth_mbps: f64, latency_ms: f64) -> Self {
        Self {
            bandwidth_mbps,
            latency_ms,
        }
    }
}

#[async_trait]
impl NetworkProbe for StaticProbe {
    async fn measure(&self) -> DeliveryResult<(f64, f64)> {
        Ok((self.bandwidth_mbps, self.latency_ms))
    }
}

/// Periodic network profiler.
pub struct NetworkProfiler {
    probe: Arc<dyn NetworkProbe>,
    sample_interval: Duration,
    current: watch::Sender<Option<NetworkProfile>>,
    // Held so the `current` channel always has a live receiver; otherwise
    // `Sender::send` no-ops when no external subscriber exists and the
    // published value would never be retained.
    _current_rx: watch::Receiver<Option<NetworkProfile>>,
    shutdown: watch::Sender<bool>,
}

impl NetworkProfiler {
    /// Create a profiler over a probe. Call [`start`](Self::start) to begin
    /// periodic sampling; `measure_network_condition` works either way.
    pub fn new(probe: Arc<dyn NetworkProbe>, sample_interval: Duration) -> Self {
        let (current, current_rx) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);
        Self {
            probe,
            sample_interval,
            current,
            _current_rx: current_rx,
            shutdown,
        }
    }

    /// Take a fresh measurement and publish it.
    pub async fn measure_network_condition(&self) -> DeliveryResult<NetworkProfile> {
        let (bandwidth_mbps, latency_ms) = self.probe.measure().await?;
        let profile = NetworkProfile::from_measurement(bandwidth_mbps, latency_ms);

        let previous = self.current.borrow().clone();
        match &previous {
            Some(prev) if prev.quality != profile.quality => {
                info!(
                    from = prev.quality.as_str(),
                    to = profile.quality.as_str(),
                    bandwidth_mbps = profile.bandwidth_mbps,
                    latency_ms = profile.latency_ms,
                    "Network quality transition"
                );
            }
            None => {
                info!(
                    quality = profile.quality.as_str(),
                    bandwidth_mbps = profile.bandwidth_mbps,
                    "Initial network profile"
                );
            }
            _ => {
                debug!(
                    quality = profile.quality.as_str(),
                    bandwidth_mbps = profile.bandwidth_mbps,
                    "Network profile refreshed"
                );
            }
        }

        let _ = self.current.send(Some(profile.clone()));
        Ok(profile)
    }

    /// Latest published profile, if any measurement has completed.
    pub fn current(&self) -> Option<NetworkProfile> {
        self.current.borrow().clone()
    }

    /// Subscribe to profile updates.
    pub fn subscribe(&self) -> watch::Receiver<Option<NetworkProfile>> {
        self.current.subscribe()
    }

    /// Spawn the periodic sampling task. Stopped by [`shutdown`](Self::shutdown).
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let profiler = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(profiler.sample_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Network profiler stopping");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        if let Err(e) = profiler.measure_network_condition().await {
                            warn!(error = %e, "Network measurement failed");
                        }
                    }
                }
            }
        })
    }

    /// Stop the sampling task.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_models::NetworkQuality;

    #[tokio::test]
    async fn test_measure_publishes_profile() {
        let profiler = NetworkProfiler::new(
            Arc::new(StaticProbe::new(20.0, 30.0)),
            Duration::from_secs(60),
        );
        assert!(profiler.current().is_none());

        let profile = profiler.measure_network_condition().await.unwrap();
        assert_eq!(profile.quality, NetworkQuality::Excellent);
        assert_eq!(profiler.current().unwrap().quality, NetworkQuality::Excellent);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let profiler = NetworkProfiler::new(
            Arc::new(StaticProbe::new(0.5, 900.0)),
            Duration::from_secs(60),
        );
        let mut rx = profiler.subscribe();

        profiler.measure_network_condition().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().quality, NetworkQuality::Poor);
    }

    #[tokio::test]
    async fn test_sampling_task_start_and_shutdown() {
        let profiler = Arc::new(NetworkProfiler::new(
            Arc::new(StaticProbe::new(8.0, 50.0)),
            Duration::from_millis(5),
        ));
        let handle = profiler.start();

        // Give the sampler a couple of ticks
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(profiler.current().is_some());

        profiler.shutdown();
        handle.await.unwrap();
    }
}
