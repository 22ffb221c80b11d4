//! In-memory storage backend
//!
//! Counters and gauges live in two separate maps behind one coarse
//! readers-writer lock: any number of readers proceed in parallel, a writer
//! excludes everyone else for the duration of its update.
//!
//! ## Limitations
//!
//! - **No persistence on its own**: pair with a
//!   [`SnapshotFile`](super::snapshot::SnapshotFile) to survive restarts
//! - **Writers are serialized** regardless of key

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::trace;

use super::backend::MetricStore;
use super::error::{StorageError, StorageResult};
use crate::metric::{Metric, MetricError, MetricKind};

#[derive(Debug, Default)]
struct Maps {
    counters: HashMap<String, i64>,
    gauges: HashMap<String, f64>,
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    maps: RwLock<Maps>,
}

impl MemoryBackend {
    /// Create a new, empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored metrics across both kinds
    pub fn len(&self) -> usize {
        let maps = self.read();
        maps.counters.len() + maps.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every stored metric
    pub fn clear(&self) {
        let mut maps = self.write();
        maps.counters.clear();
        maps.gauges.clear();
    }

    // A panic while holding the lock cannot leave a map half-updated: every
    // write is a single insert, so the poisoned data is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MetricStore for MemoryBackend {
    async fn get(&self, kind: MetricKind, id: &str) -> StorageResult<Metric> {
        let maps = self.read();
        let (delta, value) = match kind {
            MetricKind::Counter => (maps.counters.get(id).copied(), None),
            MetricKind::Gauge => (None, maps.gauges.get(id).copied()),
        };

        if delta.is_none() && value.is_none() {
            return Err(StorageError::NotFound {
                kind,
                id: id.to_string(),
            });
        }

        Ok(Metric::from_parts(id, kind, delta, value)?)
    }

    async fn get_all(&self) -> StorageResult<Vec<Metric>> {
        let maps = self.read();
        let mut metrics = Vec::with_capacity(maps.counters.len() + maps.gauges.len());

        for (id, delta) in &maps.counters {
            metrics.push(Metric::counter(id.clone(), *delta));
        }
        for (id, value) in &maps.gauges {
            metrics.push(Metric::gauge(id.clone(), *value)?);
        }

        Ok(metrics)
    }

    async fn set(&self, metric: Metric) -> StorageResult<()> {
        trace!("in-memory set {}", metric);

        match metric.kind() {
            MetricKind::Counter => {
                let delta = metric.delta().ok_or_else(|| MetricError::InvalidMetric {
                    id: metric.id().to_string(),
                    kind: MetricKind::Counter,
                })?;

                let mut maps = self.write();
                let current = maps.counters.get(metric.id()).copied().unwrap_or(0);
                let total = current.checked_add(delta).ok_or_else(|| MetricError::InvalidValue {
                    kind: MetricKind::Counter,
                    raw: delta.to_string(),
                })?;
                maps.counters.insert(metric.id().to_string(), total);
            }
            MetricKind::Gauge => {
                let value = metric.value().ok_or_else(|| MetricError::InvalidMetric {
                    id: metric.id().to_string(),
                    kind: MetricKind::Gauge,
                })?;

                self.write().gauges.insert(metric.id().to_string(), value);
            }
        }

        Ok(())
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let maps = self.read();
        Ok(format!(
            "In-Memory: {} counters, {} gauges",
            maps.counters.len(),
            maps.gauges.len()
        ))
    }
}
