//! Dual-store key-value access: remote when reachable, local always.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use starsync_common::{Result, StoreKey};
use starsync_storage::{LocalStore, RemoteStore};

use crate::connectivity::Connectivity;
use crate::pending::PendingSync;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries replayed in this pass.
    pub attempted: usize,
    /// Entries the remote accepted.
    pub synced: usize,
    /// Keys the remote rejected.
    pub failed: Vec<StoreKey>,
    /// Whether the confirmed entries were removed from the pending map.
    pub cleared: bool,
}

impl ReconcileReport {
    /// Check if every replayed entry reached the remote.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Key-value access over a remote and a local store.
///
/// Every write lands in the local store first. Writes the remote did not
/// confirm are kept in a persisted pending map and replayed by
/// [`DualStore::reconcile`].
pub struct DualStore {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Connectivity,
    pending: Mutex<PendingSync>,
    /// Single-flight guard for reconciliation passes.
    reconciling: Mutex<()>,
}

impl DualStore {
    /// Create a dual store, loading any pending writes left by a previous run.
    ///
    /// # Errors
    /// - `LocalStore` if the persisted pending map cannot be read
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Connectivity,
    ) -> Result<Self> {
        let pending = PendingSync::load(local.as_ref())?;
        if !pending.is_empty() {
            info!("Loaded {} pending writes from a previous session", pending.len());
        }

        Ok(Self {
            local,
            remote,
            connectivity,
            pending: Mutex::new(pending),
            reconciling: Mutex::new(()),
        })
    }

    /// Whether the remote store is currently considered reachable.
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Read `key`.
    ///
    /// When online, any value the remote holds wins, even over an
    /// unconfirmed local write for the same key. Absent remote values and
    /// remote failures fall back to the local value.
    ///
    /// # Errors
    /// - `LocalStore` if the local fallback cannot be read
    pub async fn read(&self, key: &StoreKey) -> Result<Option<String>> {
        if self.is_online() {
            match self.remote.get(key).await {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => debug!("Remote has no value for {}", key),
                Err(e) => warn!("Remote read of {} failed, using local: {}", key, e),
            }
        }

        self.local.get(key)
    }

    /// Write `value` under `key`.
    ///
    /// The local store is always written first. If the remote write is not
    /// possible or fails, the write is recorded for the next
    /// reconciliation pass instead of being retried inline.
    ///
    /// An online write waits for a running reconciliation pass to finish,
    /// so the pass cannot replay an older value over it.
    ///
    /// # Errors
    /// - `LocalStore` if the local write (or the pending map) cannot be
    ///   persisted; remote failures are never returned
    pub async fn write(&self, key: &StoreKey, value: &str) -> Result<()> {
        self.local.set(key, value)?;

        if self.is_online() {
            let _flight = self.reconciling.lock().await;
            match self.remote.set(key, value).await {
                Ok(()) => {
                    // An older offline value must not be replayed over this one.
                    let mut pending = self.pending.lock().await;
                    if pending.forget(key) {
                        pending.persist(self.local.as_ref())?;
                    }
                    return Ok(());
                }
                Err(e) => warn!("Remote write of {} failed, deferring: {}", key, e),
            }
        } else {
            debug!("Offline, deferring remote write of {}", key);
        }

        let mut pending = self.pending.lock().await;
        pending.record(key, value);
        pending.persist(self.local.as_ref())
    }

    /// Replay every pending write against the remote store.
    ///
    /// The pending map is cleared only if every replayed entry succeeds; a
    /// single failure leaves all of them in place for the next pass.
    /// Replaying an already-synced key again is harmless because remote
    /// writes are idempotent per key.
    pub async fn reconcile(&self) -> ReconcileReport {
        let _flight = self.reconciling.lock().await;

        let snapshot = self.pending.lock().await.clone();
        if snapshot.is_empty() {
            return ReconcileReport {
                cleared: true,
                ..ReconcileReport::default()
            };
        }

        info!("Reconciling {} pending writes", snapshot.len());

        let mut report = ReconcileReport {
            attempted: snapshot.len(),
            ..ReconcileReport::default()
        };

        for (key, value) in snapshot.iter() {
            match self.remote.set(key, value).await {
                Ok(()) => report.synced += 1,
                Err(e) => {
                    warn!("Failed to sync {}: {}", key, e);
                    report.failed.push(key.clone());
                }
            }
        }

        if !report.is_complete() {
            warn!(
                "Reconciliation incomplete ({} of {} failed), keeping pending writes",
                report.failed.len(),
                report.attempted
            );
            return report;
        }

        let mut pending = self.pending.lock().await;
        pending.clear_confirmed(&snapshot);
        match pending.persist(self.local.as_ref()) {
            Ok(()) => {
                report.cleared = true;
                info!("Offline data synced successfully ({} keys)", report.synced);
            }
            Err(e) => error!("Synced pending writes but could not persist the map: {}", e),
        }

        report
    }

    /// Keys with unconfirmed writes, in key order.
    pub async fn pending_keys(&self) -> Vec<StoreKey> {
        self.pending.lock().await.keys()
    }

    /// Check if any write awaits reconciliation.
    pub async fn has_pending(&self) -> bool {
        !self.pending.lock().await.is_empty()
    }

    /// Copy of the pending map.
    pub async fn pending(&self) -> PendingSync {
        self.pending.lock().await.clone()
    }
}
