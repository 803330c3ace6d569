use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arr_shared::RevenueSnapshot;
use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::metrics;
use crate::store::{SnapshotStore, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub global_ttl: Duration,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_ttl: Duration::from_secs(60),
            max_capacity: 1_000,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(enabled_str) = std::env::var("CACHE_ENABLED") {
            config.enabled = enabled_str.to_lowercase() == "true";
        }

        if let Ok(ttl_str) = std::env::var("CACHE_TTL_SECONDS") {
            if let Ok(secs) = ttl_str.parse::<u64>() {
                config.global_ttl = Duration::from_secs(secs);
            }
        }

        if let Ok(capacity_str) = std::env::var("CACHE_MAX_CAPACITY") {
            if let Ok(capacity) = capacity_str.parse::<u64>() {
                config.max_capacity = capacity;
            }
        }

        tracing::info!(
            "Cache config loaded: enabled={}, ttl={:?}, capacity={}",
            config.enabled,
            config.global_ttl,
            config.max_capacity
        );

        config
    }
}

#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

/// Keeps parsed snapshots for a while so repeated dashboard loads skip disk
/// and JSON parsing. Entries expire after the configured TTL.
pub struct CachedSnapshotStore {
    inner: Box<dyn SnapshotStore>,
    cache: MokaCache<String, Arc<RevenueSnapshot>>,
    config: CacheConfig,
    metrics: CacheMetrics,
}

impl CachedSnapshotStore {
    pub fn new(inner: Box<dyn SnapshotStore>, config: CacheConfig) -> Self {
        Self {
            inner,
            cache: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.global_ttl)
                .build(),
            config,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }
}

#[async_trait]
impl SnapshotStore for CachedSnapshotStore {
    async fn load(&self, tenant: &str) -> Result<Arc<RevenueSnapshot>, StoreError> {
        if !self.config.enabled {
            return self.inner.load(tenant).await;
        }

        if let Some(snapshot) = self.cache.get(tenant).await {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
            metrics::SNAPSHOT_CACHE_HITS.inc();
            return Ok(snapshot);
        }

        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        metrics::SNAPSHOT_CACHE_MISSES.inc();
        let snapshot = self.inner.load(tenant).await?;
        self.cache.insert(tenant.to_string(), snapshot.clone()).await;
        Ok(snapshot)
    }
}
