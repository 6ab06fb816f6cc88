//! Observable online/offline signal.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Value published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    /// Number of offline-to-online transitions so far.
    ///
    /// Subscribers may miss intermediate values when the flag flaps
    /// quickly; comparing this counter still reveals every restore.
    pub restored: u64,
}

/// Shared connectivity flag.
///
/// Cloning is cheap; every clone observes and drives the same flag.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl Connectivity {
    /// Create a signal with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState {
            online,
            restored: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    /// Current state including the restore counter.
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Update the state. Returns whether it actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if current.online == online {
                return false;
            }
            current.online = online;
            if online {
                current.restored += 1;
            }
            true
        });
        if changed {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
        changed
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Connectivity")
            .field("online", &state.online)
            .field("restored", &state.restored)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_online_reports_changes() {
        let connectivity = Connectivity::new(false);
        assert!(!connectivity.is_online());

        assert!(connectivity.set_online(true));
        assert!(!connectivity.set_online(true));
        assert!(connectivity.is_online());
    }

    #[test]
    fn test_clones_share_state() {
        let a = Connectivity::new(true);
        let b = a.clone();
        b.set_online(false);
        assert!(!a.is_online());
    }

    #[test]
    fn test_restore_counter_counts_only_restores() {
        let connectivity = Connectivity::new(true);
        connectivity.set_online(false);
        connectivity.set_online(true);
        connectivity.set_online(true);
        connectivity.set_online(false);
        connectivity.set_online(true);

        assert_eq!(connectivity.state().restored, 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let connectivity = Connectivity::new(false);
        let mut rx = connectivity.subscribe();

        connectivity.set_online(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().online);
    }

    #[tokio::test]
    async fn test_coalesced_flap_still_visible() {
        let connectivity = Connectivity::new(true);
        let mut rx = connectivity.subscribe();
        let seen = rx.borrow_and_update().restored;

        connectivity.set_online(false);
        connectivity.set_online(true);

        rx.changed().await.unwrap();
        let state = *rx.borrow_and_update();
        assert!(state.online);
        assert!(state.restored > seen);
    }
}
