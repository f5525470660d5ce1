//! On-device artifact cache.
//!
//! The cache manager is the single owner of cached byte accounting and of
//! every eviction decision; no other component deletes cache files. It is
//! constructed explicitly and carries an `init`/`shutdown` lifecycle so
//! tests can run isolated instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::device::memory_pressure_ratio;
use crate::error::{DeliveryError, DeliveryResult};

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding cached artifacts
    pub root_dir: PathBuf,
    /// Byte budget before LRU eviction
    pub max_bytes: u64,
    /// Used/total memory ratio that triggers forced cleanup
    pub pressure_threshold: f64,
    /// How often the pressure monitor samples
    pub pressure_interval: Duration,
    /// Eviction target as a fraction of `max_bytes`
    pub evict_to_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: std::env::temp_dir().join("obscura-cache"),
            max_bytes: 500 * 1024 * 1024,
            pressure_threshold: 0.8,
            pressure_interval: Duration::from_secs(30),
            evict_to_ratio: 0.7,
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root_dir: std::env::var("OBSCURA_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.root_dir),
            max_bytes: std::env::var("OBSCURA_CACHE_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_bytes),
            pressure_threshold: std::env::var("OBSCURA_CACHE_PRESSURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pressure_threshold),
            pressure_interval: Duration::from_secs(
                std::env::var("OBSCURA_CACHE_PRESSURE_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            evict_to_ratio: defaults.evict_to_ratio,
        }
    }
}

/// Accounting record for one cached artifact.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Size in bytes
    pub size: u64,
    /// Last access timestamp, drives LRU ordering
    pub last_access: DateTime<Utc>,
    /// File path inside the cache root
    path: PathBuf,
}

/// Telemetry snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    /// Total cached bytes
    pub size: u64,
    /// Number of entries
    pub count: usize,
    /// Hits / (hits + misses), 0 when never queried
    pub hit_rate: f64,
}

#[derive(Default)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
}

/// On-device cache of processed artifacts and quality variants.
pub struct CacheManager {
    config: CacheConfig,
    index: Mutex<CacheIndex>,
    hits: AtomicU64,
    misses: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl CacheManager {
    /// Create a cache manager. Call [`init`](Self::init) before use.
    pub fn new(config: CacheConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            index: Mutex::new(CacheIndex::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            shutdown,
        }
    }

    /// Create the cache directory and rebuild accounting from any files a
    /// previous run left behind.
    pub async fn init(&self) -> DeliveryResult<()> {
        tokio::fs::create_dir_all(&self.config.root_dir).await?;

        let mut index = self.lock_index();
        for entry in std::fs::read_dir(&self.config.root_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let key = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            index.total_bytes += size;
            index.entries.insert(
                key,
                CacheEntry {
                    size,
                    last_access: Utc::now(),
                    path,
                },
            );
        }

        info!(
            entries = index.entries.len(),
            bytes = index.total_bytes,
            dir = ?self.config.root_dir,
            "Cache initialized"
        );
        Ok(())
    }

    /// Path a producer should write a new artifact to before registering it.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.config.root_dir.join(sanitize_key(key))
    }

    /// Register a file previously written to [`path_for`](Self::path_for).
    pub fn insert(&self, key: &str) -> DeliveryResult<()> {
        let path = self.path_for(key);
        let size = std::fs::metadata(&path)
            .map_err(|_| DeliveryError::NotFound(format!("no cache file at {}", path.display())))?
            .len();

        let evicted = {
            let mut index = self.lock_index();
            let file_key = sanitize_key(key);
            if let Some(old) = index.entries.remove(&file_key) {
                index.total_bytes = index.total_bytes.saturating_sub(old.size);
            }
            index.total_bytes += size;
            index.entries.insert(
                file_key,
                CacheEntry {
                    size,
                    last_access: Utc::now(),
                    path,
                },
            );

            self.evict_over_budget_locked(&mut index, self.config.max_bytes)
        };

        self.remove_files(evicted);
        self.publish_metrics();
        Ok(())
    }

    /// Look up an artifact, refreshing its LRU position.
    pub fn get(&self, key: &str) -> Option<PathBuf> {
        let mut index = self.lock_index();
        match index.entries.get_mut(&sanitize_key(key)) {
            Some(entry) => {
                entry.last_access = Utc::now();
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("obscura_cache_hits").increment(1);
                Some(entry.path.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("obscura_cache_misses").increment(1);
                None
            }
        }
    }

    /// Whether a key is cached, without touching hit accounting.
    pub fn contains(&self, key: &str) -> bool {
        self.lock_index().entries.contains_key(&sanitize_key(key))
    }

    /// Remove one entry and its file.
    pub fn remove(&self, key: &str) {
        let removed = {
            let mut index = self.lock_index();
            index.entries.remove(&sanitize_key(key)).map(|entry| {
                index.total_bytes = index.total_bytes.saturating_sub(entry.size);
                entry
            })
        };
        self.remove_files(removed.into_iter().collect());
        self.publish_metrics();
    }

    /// Evict least-recently-used entries down to the configured fraction of
    /// the byte budget. Runs on memory pressure and on demand.
    pub fn force_cleanup(&self) {
        let target = (self.config.max_bytes as f64 * self.config.evict_to_ratio) as u64;
        let evicted = {
            let mut index = self.lock_index();
            self.evict_over_budget_locked(&mut index, target)
        };
        if !evicted.is_empty() {
            info!(evicted = evicted.len(), "Forced cache cleanup");
        }
        self.remove_files(evicted);
        self.publish_metrics();
    }

    /// Device-aware telemetry: size, entry count, hit rate.
    pub fn stats(&self) -> CacheStats {
        let index = self.lock_index();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            size: index.total_bytes,
            count: index.entries.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    /// Spawn the memory-pressure monitor. Checked on a fixed interval;
    /// crossing the threshold triggers [`force_cleanup`](Self::force_cleanup).
    pub fn start_pressure_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache.config.pressure_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            debug!("Cache pressure monitor stopping");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let ratio = memory_pressure_ratio();
                        if ratio > cache.config.pressure_threshold {
                            warn!(ratio, "Memory pressure above threshold, forcing cache cleanup");
                            cache.force_cleanup();
                        }
                    }
                }
            }
        })
    }

    /// Stop background monitoring.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, CacheIndex> {
        // A poisoned lock only means a panic mid-update; the accounting is
        // still usable.
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pop LRU entries until total bytes fit `budget`. Returns the evicted
    /// entries; file deletion happens outside the lock.
    fn evict_over_budget_locked(
        &self,
        index: &mut CacheIndex,
        budget: u64,
    ) -> Vec<CacheEntry> {
        let mut evicted = Vec::new();
        while index.total_bytes > budget {
            let Some(lru_key) = index
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(entry) = index.entries.remove(&lru_key) {
                index.total_bytes = index.total_bytes.saturating_sub(entry.size);
                debug!(key = %lru_key, size = entry.size, "Evicting cache entry");
                evicted.push(entry);
            }
        }
        evicted
    }

    fn remove_files(&self, entries: Vec<CacheEntry>) {
        for entry in entries {
            if let Err(e) = std::fs::remove_file(&entry.path) {
                warn!(path = ?entry.path, error = %e, "Failed to delete evicted cache file");
            }
        }
    }

    fn publish_metrics(&self) {
        let index = self.lock_index();
        metrics::gauge!("obscura_cache_bytes").set(index.total_bytes as f64);
        metrics::gauge!("obscura_cache_entries").set(index.entries.len() as f64);
    }
}

/// Map an arbitrary artifact URI to a safe cache file name.
fn sanitize_key(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
            c
        } else {
            '_'
        })
        .collect();
    name.truncate(200);
    name
}

/// Write bytes under a key and register them in one step. Used by the
/// preloading job handler, which downloads straight into the cache.
pub async fn store_bytes(cache: &CacheManager, key: &str, bytes: &[u8]) -> DeliveryResult<()> {
    tokio::fs::write(cache.path_for(key), bytes).await?;
    cache.insert(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cache(max_bytes: u64) -> (tempfile::TempDir, Arc<CacheManager>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(CacheManager::new(CacheConfig {
            root_dir: dir.path().to_path_buf(),
            max_bytes,
            ..Default::default()
        }));
        (dir, cache)
    }

    #[tokio::test]
    async fn test_insert_get_and_hit_rate() {
        let (_dir, cache) = test_cache(1024 * 1024);
        cache.init().await.unwrap();

        store_bytes(&cache, "clip-720p.mp4", b"variant bytes").await.unwrap();

        assert!(cache.get("clip-720p.mp4").is_some());
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.size, 13);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_lru_eviction_respects_budget() {
        let (_dir, cache) = test_cache(25);
        cache.init().await.unwrap();

        store_bytes(&cache, "a", b"0123456789").await.unwrap();
        store_bytes(&cache, "b", b"0123456789").await.unwrap();

        // Touch "a" so "b" is the LRU victim
        cache.get("a");
        store_bytes(&cache, "c", b"0123456789").await.unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.stats().size <= 25);
    }

    #[tokio::test]
    async fn test_force_cleanup_evicts_to_target() {
        let (_dir, cache) = test_cache(100);
        cache.init().await.unwrap();

        for key in ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"] {
            store_bytes(&cache, key, b"0123456789").await.unwrap();
        }
        assert_eq!(cache.stats().size, 100);

        cache.force_cleanup();
        assert!(cache.stats().size <= 70);
    }

    #[tokio::test]
    async fn test_remove_deletes_file() {
        let (_dir, cache) = test_cache(1024);
        cache.init().await.unwrap();

        store_bytes(&cache, "gone", b"bytes").await.unwrap();
        let path = cache.get("gone").unwrap();
        assert!(path.exists());

        cache.remove("gone");
        assert!(!path.exists());
        assert_eq!(cache.stats().count, 0);
    }

    #[tokio::test]
    async fn test_init_rebuilds_accounting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stale.mp4"), b"leftover").unwrap();

        let cache = CacheManager::new(CacheConfig {
            root_dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        cache.init().await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.size, 8);
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("a/b c.mp4"), "a_b_c.mp4");
        assert!(sanitize_key(&"x".repeat(500)).len() <= 200);
    }
}
