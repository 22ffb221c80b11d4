//! Storage backends for metric persistence
//!
//! This module provides a trait-based abstraction over where metrics live.
//!
//! ## Design
//!
//! - **Trait-based**: `MetricStore` lets handlers stay unaware of the backend
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Merge on write**: counters accumulate, gauges are last-write-wins
//!
//! ## Backends
//!
//! - **SQLite** (durable): shared table, atomic upserts, retried round trips
//! - **In-Memory** (fallback): two maps behind one lock, persisted through
//!   periodic JSON snapshots
//!
//! ## Usage
//!
//! ```no_run
//! use metric_keeper::{config::StorageConfig, storage::select_backend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let selected = select_backend(&StorageConfig::default()).await;
//!     selected.store.update("counter", "hits", "1").await?;
//!     selected.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod retry;
pub mod select;
pub mod snapshot;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::MetricStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
pub use select::{BackendKind, SelectedStorage, select_backend};
pub use snapshot::{SNAPSHOT_VERSION, SnapshotFile, decode_snapshot, encode_snapshot};
