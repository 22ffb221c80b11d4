//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use metric_keeper::config::StorageConfig;
use metric_keeper::storage::{MemoryBackend, MetricStore, RetryPolicy};

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(10))
}

/// Memory-only config writing snapshots into `dir`
pub fn memory_config(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        database_dsn: None,
        file_storage_path: Some(dir.path().join("metrics.json")),
        store_interval_secs: 3600,
        ..Default::default()
    }
}

/// Every backend this build can construct, each in its own temp dir
pub async fn all_backends(dir: &tempfile::TempDir) -> Vec<(&'static str, Arc<dyn MetricStore>)> {
    #[allow(unused_mut)]
    let mut backends: Vec<(&'static str, Arc<dyn MetricStore>)> =
        vec![("memory", Arc::new(MemoryBackend::new()))];

    #[cfg(feature = "storage-sqlite")]
    {
        use metric_keeper::storage::sqlite::SqliteBackend;

        let path = dir.path().join("metrics.db");
        let sqlite = SqliteBackend::open(&path.to_string_lossy(), fast_retry())
            .await
            .unwrap();
        backends.push(("sqlite", Arc::new(sqlite)));
    }

    #[cfg(not(feature = "storage-sqlite"))]
    let _ = dir;

    backends
}
