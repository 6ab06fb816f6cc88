//! Writes recorded locally but not yet confirmed by the remote store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use starsync_common::{Error, Result, StoreKey};
use starsync_storage::LocalStore;

/// Local-store key holding the persisted pending map.
pub fn pending_sync_key() -> StoreKey {
    StoreKey::reserved("pending")
}

/// Pending writes keyed by store key.
///
/// Only the newest value per key is kept: a later write for the same key
/// replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingSync {
    entries: BTreeMap<StoreKey, String>,
}

impl PendingSync {
    /// Create an empty pending map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the persisted map from the local store.
    ///
    /// A malformed persisted map is discarded with a warning rather than
    /// failing startup.
    ///
    /// # Errors
    /// - `LocalStore` if the local store cannot be read
    pub fn load(local: &dyn LocalStore) -> Result<Self> {
        let Some(raw) = local.get(&pending_sync_key())? else {
            return Ok(Self::new());
        };

        match serde_json::from_str(&raw) {
            Ok(pending) => Ok(pending),
            Err(e) => {
                warn!("Discarding malformed pending-sync map: {}", e);
                Ok(Self::new())
            }
        }
    }

    /// Persist the map to the local store. An empty map removes the key.
    pub fn persist(&self, local: &dyn LocalStore) -> Result<()> {
        if self.entries.is_empty() {
            return local.remove(&pending_sync_key());
        }
        let json =
            serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))?;
        local.set(&pending_sync_key(), &json)
    }

    /// Record `value` as the newest unconfirmed write for `key`.
    pub fn record(&mut self, key: &StoreKey, value: &str) {
        self.entries.insert(key.clone(), value.to_string());
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn forget(&mut self, key: &StoreKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose value still equals the one in `confirmed`.
    ///
    /// Entries rewritten after `confirmed` was taken are kept, since the
    /// remote has not seen their newer value yet.
    pub fn clear_confirmed(&mut self, confirmed: &PendingSync) {
        self.entries
            .retain(|key, value| confirmed.get(key) != Some(value.as_str()));
    }

    /// Pending value for `key`, if any.
    pub fn get(&self, key: &StoreKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Check if `key` has an unconfirmed write.
    pub fn contains(&self, key: &StoreKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StoreKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Pending keys in key order.
    pub fn keys(&self) -> Vec<StoreKey> {
        self.entries.keys().cloned().collect()
    }

    /// Get count of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
