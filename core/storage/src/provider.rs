//! Key-value store trait definitions.

use async_trait::async_trait;

use starsync_common::{Result, StoreKey};

/// On-device durable key-value store.
///
/// The local store is assumed to be always available and synchronous. It is
/// written on every persisted mutation, before any remote attempt, so an
/// error from it is never absorbed by callers.
pub trait LocalStore: Send + Sync {
    /// Get the store name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Read the value stored under `key`.
    ///
    /// # Returns
    /// `None` if the key was never written (or was removed).
    ///
    /// # Errors
    /// - `LocalStore` if the backing medium cannot be read
    fn get(&self, key: &StoreKey) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Postconditions
    /// - A subsequent `get(key)` returns `value`
    ///
    /// # Errors
    /// - `LocalStore` on quota / full-disk / permission failures
    fn set(&self, key: &StoreKey, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &StoreKey) -> Result<()>;
}

/// Remote, authoritative-when-reachable key-value store.
///
/// Implementations must handle their own authentication. Any error is
/// treated as "remote not usable right now" by the dual store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Get the store name (e.g., "memory", "http").
    fn name(&self) -> &str;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// - `RemoteUnavailable` when the backend cannot be reached
    /// - `NotFound` when the backend reports the key as missing
    async fn get(&self, key: &StoreKey) -> Result<Option<String>>;

    /// Store `value` under `key`.
    ///
    /// Writes are idempotent per key: repeating the same write is harmless.
    ///
    /// # Errors
    /// - `RemoteUnavailable` when the backend cannot be reached
    async fn set(&self, key: &StoreKey, value: &str) -> Result<()>;
}
