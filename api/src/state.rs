use std::sync::Arc;
use std::time::Instant;

use arr_engine::ArrBreakdownEngine;
use prometheus::Registry;

use crate::cache::{CacheConfig, CachedSnapshotStore};
use crate::config::ApiConfig;
use crate::store::FileSnapshotStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub started_at: Instant,
    pub snapshots: Arc<CachedSnapshotStore>,
    pub engine: ArrBreakdownEngine,
    pub registry: Registry,
}

impl AppState {
    pub fn new(config: &ApiConfig, engine: ArrBreakdownEngine, registry: Registry) -> Self {
        Self::with_cache(config, engine, CacheConfig::from_env(), registry)
    }

    pub fn with_cache(
        config: &ApiConfig,
        engine: ArrBreakdownEngine,
        cache: CacheConfig,
        registry: Registry,
    ) -> Self {
        let files = FileSnapshotStore::new(config.data_dir.clone());
        Self {
            started_at: Instant::now(),
            snapshots: Arc::new(CachedSnapshotStore::new(Box::new(files), cache)),
            engine,
            registry,
        }
    }
}
