//! SnapshotActor - periodically saves the in-memory store to disk
//!
//! ## Lifecycle
//!
//! - Every `interval` the full store is written to the snapshot file
//! - `SaveNow` forces an immediate save
//! - On a termination signal or a `Shutdown` command, one final save is
//!   written before the actor stops
//!
//! Save failures are logged and counted, never fatal: the service keeps
//! serving from memory and the next tick tries again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use super::messages::{SnapshotCommand, SnapshotStats};
use crate::storage::{MetricStore, SnapshotFile, StorageResult};
use crate::util::termination_signal;

/// Smallest interval accepted between two timed saves
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Why the actor's loop stopped
enum StopReason {
    Signal,
    Command,
    ChannelClosed,
}

pub struct SnapshotActor {
    store: Arc<dyn MetricStore>,
    file: SnapshotFile,
    interval: Duration,
    command_rx: mpsc::Receiver<SnapshotCommand>,
    stats: SnapshotStats,
}

impl SnapshotActor {
    pub fn new(
        store: Arc<dyn MetricStore>,
        file: SnapshotFile,
        interval: Duration,
        command_rx: mpsc::Receiver<SnapshotCommand>,
    ) -> Self {
        let interval = if interval.is_zero() {
            warn!("snapshot interval of zero requested, using {:?}", MIN_INTERVAL);
            MIN_INTERVAL
        } else {
            interval
        };

        Self {
            store,
            file,
            interval,
            command_rx,
            stats: SnapshotStats::default(),
        }
    }

    /// Run the actor's main loop until `shutdown` resolves, a `Shutdown`
    /// command arrives, or every handle is dropped
    #[instrument(skip_all, fields(path = %self.file.path().display()))]
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        debug!("starting snapshot actor (interval: {:?})", self.interval);

        // The first tick fires one interval from now, not immediately
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    trace!("timed snapshot triggered");
                    let _ = self.save().await;
                }

                _ = &mut shutdown => break StopReason::Signal,

                cmd = self.command_rx.recv() => match cmd {
                    Some(SnapshotCommand::SaveNow { respond_to }) => {
                        debug!("manual snapshot requested");
                        let _ = respond_to.send(self.save().await);
                    }
                    Some(SnapshotCommand::GetStats { respond_to }) => {
                        let _ = respond_to.send(self.stats.clone());
                    }
                    Some(SnapshotCommand::Shutdown) => break StopReason::Command,
                    None => break StopReason::ChannelClosed,
                },
            }
        };

        match reason {
            StopReason::Signal => info!("termination signal received, writing final snapshot"),
            StopReason::Command => debug!("shutdown requested, writing final snapshot"),
            StopReason::ChannelClosed => warn!("command channel closed, writing final snapshot"),
        }

        if self.save().await.is_ok() {
            info!(
                "final snapshot written ({} metrics)",
                self.stats.last_saved_metrics
            );
        }

        debug!("snapshot actor stopped");
    }

    async fn save(&mut self) -> StorageResult<usize> {
        let result = self.file.save(self.store.as_ref()).await;

        match &result {
            Ok(count) => {
                self.stats.save_count += 1;
                self.stats.last_saved_metrics = *count;
                self.stats.last_save = Some(Utc::now());
                trace!("snapshot #{} complete ({count} metrics)", self.stats.save_count);
            }
            Err(e) => {
                self.stats.failed_saves += 1;
                error!("failed to write snapshot: {e}");
            }
        }

        result
    }
}

/// Handle to a running SnapshotActor
pub struct SnapshotHandle {
    sender: mpsc::Sender<SnapshotCommand>,
    task: JoinHandle<()>,
}

impl SnapshotHandle {
    /// Spawn a snapshot actor that also stops on SIGINT/SIGTERM
    pub fn spawn(store: Arc<dyn MetricStore>, file: SnapshotFile, interval: Duration) -> Self {
        Self::spawn_with_shutdown(store, file, interval, termination_signal())
    }

    /// Spawn a snapshot actor that stops when `shutdown` resolves
    pub fn spawn_with_shutdown(
        store: Arc<dyn MetricStore>,
        file: SnapshotFile,
        interval: Duration,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SnapshotActor::new(store, file, interval, cmd_rx);
        let task = tokio::spawn(actor.run(shutdown));

        Self {
            sender: cmd_tx,
            task,
        }
    }

    /// Write a snapshot now and return the number of metrics written
    pub async fn save_now(&self) -> anyhow::Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SnapshotCommand::SaveNow { respond_to: tx })
            .await?;

        Ok(rx.await??)
    }

    /// Get snapshot statistics
    pub async fn get_stats(&self) -> Option<SnapshotStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SnapshotCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Whether the actor has already stopped (e.g. after a termination signal)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the actor and wait until its final snapshot is written
    ///
    /// If the actor already stopped on a termination signal, this only waits
    /// for that final save; no second snapshot is written.
    pub async fn shutdown(self) {
        let _ = self.sender.send(SnapshotCommand::Shutdown).await;

        if let Err(e) = self.task.await {
            error!("snapshot actor terminated abnormally: {e}");
        }
    }
}
