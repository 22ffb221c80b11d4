//! Storage contract shared by every backend
//!
//! The request-handling layer only ever talks to an `Arc<dyn MetricStore>`;
//! which backend sits behind it is decided once at startup by
//! [`select_backend`](super::select::select_backend).

use async_trait::async_trait;

use super::error::{StorageError, StorageResult};
use crate::metric::{Metric, MetricKind};

/// Trait for metric storage backends
///
/// ## Merge semantics
///
/// - **Counter**: `set` adds the incoming delta to the stored total
///   (zero if absent)
/// - **Gauge**: `set` replaces the stored value
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; they are shared by every
/// request handler of the process.
///
/// ## Error Handling
///
/// Errors always propagate to the caller. `get` returns
/// [`StorageError::NotFound`] for a key that was never set.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Fetch the current metric stored under `(kind, id)`
    async fn get(&self, kind: MetricKind, id: &str) -> StorageResult<Metric>;

    /// Fetch every stored metric, in no particular order
    async fn get_all(&self) -> StorageResult<Vec<Metric>>;

    /// Merge one observation into the store
    async fn set(&self, metric: Metric) -> StorageResult<()>;

    /// Liveness check for the health endpoint
    ///
    /// Only durable backends hold a connection worth checking, so the
    /// default reports the backend as unhealthy.
    async fn ping(&self) -> StorageResult<()> {
        Err(StorageError::UnhealthyBackend(
            "no durable backend connected".to_string(),
        ))
    }

    /// Human-readable backend statistics for logging
    async fn get_stats(&self) -> StorageResult<String>;

    /// Release connections and other resources
    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Parse raw transport strings and merge the observation
    async fn update(&self, kind: &str, id: &str, raw: &str) -> StorageResult<()> {
        let metric = Metric::new(id, kind, raw)?;
        self.set(metric).await
    }

    /// Look up a metric by raw kind name and render its canonical value
    async fn value(&self, kind: &str, id: &str) -> StorageResult<String> {
        let kind = kind.parse::<MetricKind>()?;
        let metric = self.get(kind, id).await?;
        Ok(metric.value_string()?)
    }
}
