//! In-memory stores for testing and development.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::provider::{LocalStore, RemoteStore};
use starsync_common::{Error, Result, StoreKey};

/// In-memory local store.
///
/// All data is lost on drop. The store can be switched to read-only to
/// simulate quota or full-disk failures.
#[derive(Default)]
pub struct MemoryLocalStore {
    entries: RwLock<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryLocalStore {
    /// Create a new empty local store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &StoreKey) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key.as_str()).cloned())
    }

    fn set(&self, key: &StoreKey, value: &str) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::LocalStore(format!(
                "Store is read-only, cannot write {}",
                key
            )));
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.as_str().to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(Error::LocalStore(format!(
                "Store is read-only, cannot remove {}",
                key
            )));
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key.as_str());
        Ok(())
    }
}

/// In-memory remote store with fault injection.
///
/// The store can be made unreachable as a whole, or made to fail writes for
/// individual keys, which is what sync tests need to exercise partial
/// failures.
pub struct MemoryRemoteStore {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    failing_keys: RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Create a new empty, reachable remote store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            failing_keys: RwLock::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Toggle reachability of the whole store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make writes to `key` fail until [`Self::heal_key`] is called.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
    }

    /// Undo [`Self::fail_key`].
    pub fn heal_key(&self, key: &str) {
        self.failing_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Peek at a stored value without going through the async trait.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Seed a value directly, bypassing availability checks.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::RemoteUnavailable(
                "Memory remote store is offline".to_string(),
            ))
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.peek(key.as_str()))
    }

    async fn set(&self, key: &StoreKey, value: &str) -> Result<()> {
        self.ensure_available()?;

        let failing = self
            .failing_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key.as_str());
        if failing {
            return Err(Error::RemoteUnavailable(format!(
                "Write rejected for {}",
                key
            )));
        }

        self.seed(key.as_str(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> StoreKey {
        StoreKey::new(name).unwrap()
    }

    #[test]
    fn test_local_set_get() {
        let store = MemoryLocalStore::new();
        assert!(store.get(&key("stars")).unwrap().is_none());

        store.set(&key("stars"), "100").unwrap();
        assert_eq!(store.get(&key("stars")).unwrap().as_deref(), Some("100"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_local_remove() {
        let store = MemoryLocalStore::new();
        store.set(&key("stars"), "100").unwrap();
        store.remove(&key("stars")).unwrap();
        store.remove(&key("never-written")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_local_read_only_fails_writes() {
        let store = MemoryLocalStore::new();
        store.set_read_only(true);

        let err = store.set(&key("stars"), "1").unwrap_err();
        assert!(matches!(err, Error::LocalStore(_)));

        store.set_read_only(false);
        store.set(&key("stars"), "1").unwrap();
    }

    #[tokio::test]
    async fn test_remote_set_get() {
        let store = MemoryRemoteStore::new();
        store.set(&key("stars"), "50").await.unwrap();

        assert_eq!(store.get(&key("stars")).await.unwrap().as_deref(), Some("50"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_remote_unavailable() {
        let store = MemoryRemoteStore::new();
        store.set_available(false);

        assert!(matches!(
            store.get(&key("stars")).await,
            Err(Error::RemoteUnavailable(_))
        ));
        assert!(store.set(&key("stars"), "1").await.is_err());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_failing_key() {
        let store = MemoryRemoteStore::new();
        store.fail_key("y");

        store.set(&key("x"), "1").await.unwrap();
        assert!(store.set(&key("y"), "2").await.is_err());
        assert!(store.peek("y").is_none());

        store.heal_key("y");
        store.set(&key("y"), "2").await.unwrap();
        assert_eq!(store.peek("y").as_deref(), Some("2"));
    }
}
