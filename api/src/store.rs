//! Tenant snapshot sources.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arr_shared::RevenueSnapshot;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static TENANT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").unwrap());

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid tenant name: {0}")]
    InvalidTenant(String),
    #[error("No revenue snapshot for tenant {0}")]
    NotFound(String),
    #[error("Failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn validate_tenant(tenant: &str) -> Result<(), StoreError> {
    if TENANT_NAME.is_match(tenant) {
        Ok(())
    } else {
        Err(StoreError::InvalidTenant(tenant.to_string()))
    }
}

/// Source of the read-only revenue snapshot a report is computed from
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, tenant: &str) -> Result<Arc<RevenueSnapshot>, StoreError>;
}

/// Reads `<data_dir>/<tenant>.json`
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    data_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, tenant: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", tenant))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, tenant: &str) -> Result<Arc<RevenueSnapshot>, StoreError> {
        validate_tenant(tenant)?;
        let path = self.path_for(tenant);
        match read_snapshot_file(&path).await {
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(tenant.to_string()))
            }
            other => other.map(Arc::new),
        }
    }
}

/// Read and parse one snapshot file.
pub async fn read_snapshot_file(path: &Path) -> Result<RevenueSnapshot, StoreError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = RevenueSnapshot::from_json_bytes(&bytes).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        path = %path.display(),
        contracts = snapshot.contracts.len(),
        service_line_items = snapshot.service_line_items.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_names_are_restricted() {
        assert!(validate_tenant("acme").is_ok());
        assert!(validate_tenant("acme_eu-2").is_ok());
        assert!(validate_tenant("").is_err());
        assert!(validate_tenant("../etc/passwd").is_err());
        assert!(validate_tenant("acme.json").is_err());
    }

    #[test]
    fn path_is_tenant_json_under_data_dir() {
        let store = FileSnapshotStore::new("/srv/arr");
        assert_eq!(store.path_for("acme"), PathBuf::from("/srv/arr/acme.json"));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let store = FileSnapshotStore::new(std::env::temp_dir().join("arr-missing-data-dir"));
        match store.load("nobody").await {
            Err(StoreError::NotFound(tenant)) => assert_eq!(tenant, "nobody"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }
}
