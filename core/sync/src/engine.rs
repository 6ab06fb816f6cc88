//! Sync engine: replays deferred work when connectivity comes back.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use starsync_api::ApiExecutor;
use starsync_common::Result;

use crate::connectivity::Connectivity;
use crate::dual_store::{DualStore, ReconcileReport};
use crate::offline_api::OfflineApi;
use crate::queue::{DrainReport, OfflineQueue};

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Assume the backend is reachable at startup.
    pub start_online: bool,
    /// Run a sync pass right after startup when online.
    pub sync_on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_online: true,
            sync_on_start: true,
        }
    }
}

/// Combined result of a sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub reconcile: ReconcileReport,
    pub drain: DrainReport,
}

impl SyncReport {
    /// Check if nothing was left behind.
    pub fn is_complete(&self) -> bool {
        self.reconcile.is_complete() && self.drain.failed.is_empty()
    }
}

/// Snapshot of outstanding sync work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub online: bool,
    pub pending_writes: usize,
    pub queued_calls: usize,
}

/// Coordinates the dual store and the offline queue.
pub struct SyncEngine {
    store: Arc<DualStore>,
    queue: Arc<OfflineQueue>,
    executor: Arc<dyn ApiExecutor>,
    connectivity: Connectivity,
    config: SyncConfig,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(
        store: Arc<DualStore>,
        queue: Arc<OfflineQueue>,
        executor: Arc<dyn ApiExecutor>,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            queue,
            executor,
            connectivity,
            config,
        }
    }

    pub fn store(&self) -> &Arc<DualStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// API access that queues calls through this engine's queue.
    pub fn offline_api(&self) -> OfflineApi {
        OfflineApi::new(
            self.executor.clone(),
            self.queue.clone(),
            self.connectivity.clone(),
        )
    }

    /// Outstanding work right now.
    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            online: self.connectivity.is_online(),
            pending_writes: self.store.pending_keys().await.len(),
            queued_calls: self.queue.len().await,
        }
    }

    /// Reconcile pending writes and drain the queue, concurrently.
    ///
    /// The two passes are independent; a failure in one never cancels the
    /// other.
    ///
    /// # Errors
    /// - `LocalStore` if the drained queue could not be persisted
    pub async fn on_connectivity_restored(&self) -> Result<SyncReport> {
        info!("Connectivity restored, syncing offline work");

        let (reconcile, drain) = tokio::join!(
            self.store.reconcile(),
            self.queue.drain(self.executor.as_ref())
        );
        let report = SyncReport {
            reconcile,
            drain: drain?,
        };

        if report.is_complete() {
            info!(
                "Sync completed: {} writes synced, {} calls replayed",
                report.reconcile.synced,
                report.drain.succeeded.len()
            );
        } else {
            warn!(
                "Sync incomplete: {} writes failed, {} calls still queued",
                report.reconcile.failed.len(),
                report.drain.remaining
            );
        }

        Ok(report)
    }

    /// Replay queued calls without reconciling the store.
    pub async fn drain_queue(&self) -> Result<DrainReport> {
        self.queue.drain(self.executor.as_ref()).await
    }

    /// Run a pass at startup if configured and online.
    pub async fn sync_on_start(&self) -> Result<Option<SyncReport>> {
        if !self.config.sync_on_start || !self.connectivity.is_online() {
            return Ok(None);
        }
        self.on_connectivity_restored().await.map(Some)
    }

    /// Spawn a background task that syncs on every offline-to-online
    /// transition until the returned handle is shut down.
    ///
    /// Transitions are detected through the restore counter, so a flap
    /// that completes before the task runs still triggers a pass. Several
    /// restores seen at once trigger a single pass.
    pub fn run_monitor(self: &Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let (report_tx, report_rx) = mpsc::channel(16);
        let mut changes = self.connectivity.subscribe();
        let initial = *changes.borrow_and_update();
        let mut restored = initial.restored;
        let engine = Arc::clone(self);

        let task = tokio::spawn(async move {
            info!("Sync monitor started (online: {})", initial.online);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Sync monitor shutting down");
                        break;
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            debug!("Connectivity signal dropped, stopping monitor");
                            break;
                        }
                        let state = *changes.borrow_and_update();
                        let missed = state.restored.saturating_sub(restored);
                        restored = state.restored;
                        if missed == 0 || !state.online {
                            continue;
                        }
                        if missed > 1 {
                            debug!("{} reconnects observed at once", missed);
                        }

                        match engine.on_connectivity_restored().await {
                            Ok(report) => {
                                // Nobody listening is fine.
                                let _ = report_tx.try_send(report);
                            }
                            Err(e) => error!("Sync after reconnect failed: {}", e),
                        }
                    }
                }
            }
        });

        MonitorHandle {
            shutdown: Some(shutdown_tx),
            reports: report_rx,
            task,
        }
    }
}

/// Handle to a running sync monitor.
pub struct MonitorHandle {
    shutdown: Option<oneshot::Sender<()>>,
    reports: mpsc::Receiver<SyncReport>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Wait for the report of the next sync the monitor runs.
    pub async fn next_report(&mut self) -> Option<SyncReport> {
        self.reports.recv().await
    }

    /// Stop the monitor and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!("Sync monitor task failed: {}", e);
        }
    }
}
