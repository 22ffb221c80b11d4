//! Message types for actor communication
//!
//! Commands are sent to a specific actor via mpsc; replies come back on
//! oneshot channels.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::storage::StorageResult;

/// Commands that can be sent to the SnapshotActor
#[derive(Debug)]
pub enum SnapshotCommand {
    /// Write a snapshot immediately, bypassing the interval timer
    ///
    /// Replies with the number of metrics written.
    SaveNow {
        respond_to: oneshot::Sender<StorageResult<usize>>,
    },

    /// Get snapshot statistics
    GetStats {
        respond_to: oneshot::Sender<SnapshotStats>,
    },

    /// Write a final snapshot and stop
    Shutdown,
}

/// Snapshot statistics
#[derive(Debug, Clone, Default)]
pub struct SnapshotStats {
    /// Number of successful saves
    pub save_count: u64,

    /// Number of saves that failed (logged and skipped)
    pub failed_saves: u64,

    /// Metrics written by the last successful save
    pub last_saved_metrics: usize,

    /// When the last successful save finished
    pub last_save: Option<DateTime<Utc>>,
}
