//! Startup backend selection
//!
//! A durable backend is preferred whenever one is configured and answers a
//! ping within the connect timeout. Otherwise the process falls back to the
//! in-memory backend, optionally restored from and periodically saved to a
//! snapshot file. Selection happens once; there is no failover at runtime.

use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::backend::MetricStore;
use super::memory::MemoryBackend;
use super::snapshot::SnapshotFile;
use crate::actors::SnapshotHandle;
use crate::config::StorageConfig;

/// Which kind of backend was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Durable,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Durable => write!(f, "durable"),
            BackendKind::Memory => write!(f, "in-memory"),
        }
    }
}

/// The process-wide store plus whatever background work keeps it persisted
pub struct SelectedStorage {
    pub store: Arc<dyn MetricStore>,
    pub kind: BackendKind,
    snapshot: Option<SnapshotHandle>,
}

impl SelectedStorage {
    /// Handle of the snapshot actor, if the in-memory backend saves to a file
    pub fn snapshot(&self) -> Option<&SnapshotHandle> {
        self.snapshot.as_ref()
    }

    /// Write the final snapshot (if any) and close the store
    pub async fn shutdown(self) {
        if let Some(snapshot) = self.snapshot {
            snapshot.shutdown().await;
        }

        if let Err(e) = self.store.close().await {
            warn!("failed to close {} backend: {e}", self.kind);
        }
    }
}

/// Pick the backend for this process
///
/// Never fails: every problem with the durable backend is logged and
/// answered with the in-memory fallback.
#[instrument(skip_all)]
pub async fn select_backend(config: &StorageConfig) -> SelectedStorage {
    if let Some(dsn) = &config.database_dsn {
        if let Some(store) = connect_durable(dsn, config).await {
            info!("using durable backend");
            return SelectedStorage {
                store,
                kind: BackendKind::Durable,
                snapshot: None,
            };
        }
        warn!("durable backend unavailable, falling back to in-memory storage");
    } else {
        info!("no database configured, using in-memory storage");
    }

    let memory = Arc::new(MemoryBackend::new());

    let snapshot = match &config.file_storage_path {
        Some(path) => {
            let file = SnapshotFile::new(path);
            file.restore(&memory, config.restore).await;
            Some(SnapshotHandle::spawn(
                memory.clone(),
                file,
                config.store_interval(),
            ))
        }
        None => {
            info!("no snapshot file configured, metrics will not survive a restart");
            None
        }
    };

    SelectedStorage {
        store: memory,
        kind: BackendKind::Memory,
        snapshot,
    }
}

#[cfg(feature = "storage-sqlite")]
async fn connect_durable(dsn: &str, config: &StorageConfig) -> Option<Arc<dyn MetricStore>> {
    use super::sqlite::SqliteBackend;

    let probe = async {
        let backend = SqliteBackend::open(dsn, config.retry_policy()).await?;
        backend.ping().await?;
        Ok::<_, super::error::StorageError>(backend)
    };

    match tokio::time::timeout(config.connect_timeout(), probe).await {
        Ok(Ok(backend)) => Some(Arc::new(backend)),
        Ok(Err(e)) => {
            warn!("could not connect to {dsn}: {e}");
            None
        }
        Err(_) => {
            warn!(
                "connecting to {dsn} timed out after {:?}",
                config.connect_timeout()
            );
            None
        }
    }
}

#[cfg(not(feature = "storage-sqlite"))]
async fn connect_durable(dsn: &str, _config: &StorageConfig) -> Option<Arc<dyn MetricStore>> {
    warn!("durable backend {dsn} configured, but this build has no durable storage support");
    None
}
