//! Common types used throughout StarSync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix reserved for the sync layer's own bookkeeping keys.
pub const RESERVED_PREFIX: &str = "__sync/";

/// A validated application key for the key-value stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(String);

impl StoreKey {
    /// Create a new application key.
    ///
    /// # Preconditions
    /// - `key` must be non-empty
    /// - `key` must not start with [`RESERVED_PREFIX`]
    ///
    /// # Errors
    /// - Returns `InvalidInput` if either precondition is violated
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Store key cannot be empty".to_string(),
            ));
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(crate::Error::InvalidInput(format!(
                "Store key '{}' uses the reserved prefix '{}'",
                key, RESERVED_PREFIX
            )));
        }
        Ok(Self(key))
    }

    /// Build a key inside the reserved namespace.
    pub fn reserved(name: &str) -> Self {
        Self(format!("{}{}", RESERVED_PREFIX, name))
    }

    /// Whether this key lives in the reserved namespace.
    pub fn is_reserved(&self) -> bool {
        self.0.starts_with(RESERVED_PREFIX)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a queued API call.
///
/// Ids are handed out in strictly increasing order, so comparing two ids
/// also compares their enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueuedCallId(u64);

impl QueuedCallId {
    /// Create an id from its raw value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The id that follows this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueuedCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
