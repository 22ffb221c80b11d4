//! Full-state snapshots of the in-memory backend
//!
//! ## Format
//!
//! A snapshot is a JSON document:
//!
//! ```json
//! {"version": 1, "saved_at": "2026-01-01T00:00:00Z",
//!  "metrics": [{"id": "hits", "type": "counter", "delta": 2},
//!              {"id": "temp", "type": "gauge", "value": 36.6}]}
//! ```
//!
//! Older snapshots without a version marker (a bare array of records) are
//! still accepted on restore. Any other version is rejected rather than
//! guessed at.
//!
//! ## Durability
//!
//! Saves are best effort: the new document is written to a sibling `.tmp`
//! file and renamed over the previous snapshot, so a crash during a save
//! leaves the last complete snapshot in place. Anything set after the last
//! successful save is lost on an unclean exit.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::backend::MetricStore;
use super::error::{StorageError, StorageResult};
use super::memory::MemoryBackend;
use crate::metric::{Metric, MetricKind};

/// Version written by [`encode_snapshot`]
pub const SNAPSHOT_VERSION: u32 = 1;

/// One metric as it appears in a snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SnapshotRecord {
    id: String,

    #[serde(rename = "type", alias = "kind")]
    kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl From<&Metric> for SnapshotRecord {
    fn from(metric: &Metric) -> Self {
        Self {
            id: metric.id().to_string(),
            kind: metric.kind().to_string(),
            delta: metric.delta(),
            value: metric.value(),
        }
    }
}

impl SnapshotRecord {
    fn into_metric(self) -> StorageResult<Metric> {
        let kind = self.kind.parse::<MetricKind>()?;
        Ok(Metric::from_parts(self.id, kind, self.delta, self.value)?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,

    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,

    metrics: Vec<SnapshotRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnySnapshot {
    Versioned(SnapshotDocument),
    Legacy(Vec<SnapshotRecord>),
}

/// Serialize `metrics` as a versioned snapshot document into `sink`
pub fn encode_snapshot<W: Write>(metrics: &[Metric], sink: W) -> StorageResult<()> {
    let document = SnapshotDocument {
        version: SNAPSHOT_VERSION,
        saved_at: Some(Utc::now()),
        metrics: metrics.iter().map(SnapshotRecord::from).collect(),
    };

    serde_json::to_writer(sink, &document)?;
    Ok(())
}

/// Decode a snapshot document from `source`
///
/// Every record is validated before anything is returned, so a snapshot
/// with a single bad record yields an error instead of a partial result.
pub fn decode_snapshot<R: Read>(source: R) -> StorageResult<Vec<Metric>> {
    let records = match serde_json::from_reader::<_, AnySnapshot>(source)? {
        AnySnapshot::Versioned(document) if document.version == SNAPSHOT_VERSION => {
            debug!(
                "decoding snapshot v{} saved at {:?}",
                document.version, document.saved_at
            );
            document.metrics
        }
        AnySnapshot::Versioned(document) => {
            return Err(StorageError::SerializationError(format!(
                "unsupported snapshot version {}",
                document.version
            )));
        }
        AnySnapshot::Legacy(records) => {
            debug!("decoding unversioned snapshot");
            records
        }
    };

    records.into_iter().map(SnapshotRecord::into_metric).collect()
}

/// Snapshot file backing an in-memory store
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Write every metric in `store` to the snapshot file, replacing the
    /// previous snapshot
    ///
    /// Returns the number of metrics written.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, store: &dyn MetricStore) -> StorageResult<usize> {
        let metrics = store.get_all().await?;

        let mut buffer = Vec::new();
        encode_snapshot(&metrics, &mut buffer)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &buffer).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("saved {} metrics to snapshot", metrics.len());
        Ok(metrics.len())
    }

    /// Read and validate the snapshot file without touching any store
    pub async fn load(&self) -> StorageResult<Vec<Metric>> {
        let bytes = tokio::fs::read(&self.path).await?;
        decode_snapshot(bytes.as_slice())
    }

    /// Replay the snapshot into a fresh in-memory store
    ///
    /// Counters are replayed through `set`, so the snapshot total becomes the
    /// new baseline of an empty store. Restoring into a store that already
    /// holds data would double-count counters and is refused.
    ///
    /// Failures are logged and leave the store empty; a missing or broken
    /// snapshot never prevents startup. Returns the number of restored metrics.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn restore(&self, store: &MemoryBackend, enabled: bool) -> usize {
        if !enabled {
            debug!("snapshot restore disabled");
            return 0;
        }

        if !store.is_empty() {
            warn!("refusing to restore snapshot into a non-empty store");
            return 0;
        }

        let metrics = match self.load().await {
            Ok(metrics) => metrics,
            Err(StorageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no snapshot found, starting empty");
                return 0;
            }
            Err(e) => {
                warn!("failed to read snapshot, starting empty: {}", e);
                return 0;
            }
        };

        let total = metrics.len();
        for metric in metrics {
            if let Err(e) = store.set(metric).await {
                warn!("failed to replay snapshot, starting empty: {}", e);
                store.clear();
                return 0;
            }
        }

        info!("restored {} metrics from snapshot", total);
        total
    }
}
