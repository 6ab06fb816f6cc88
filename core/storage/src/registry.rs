//! Registry for resolving remote stores by name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::RemoteStore;
use starsync_common::{Error, Result};

/// Factory function type for creating remote stores.
pub type RemoteStoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn RemoteStore>> + Send + Sync>;

/// Registry for remote store factories.
///
/// Lets the composition root pick a backend from configuration
/// (`{"provider": "http", "config": {...}}`) without knowing concrete types.
pub struct RemoteStoreRegistry {
    factories: HashMap<String, RemoteStoreFactory>,
}

impl RemoteStoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - `InvalidInput` if `name` is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: RemoteStoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Remote store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by name and configuration.
    ///
    /// # Errors
    /// - `NotFound` if no factory is registered under `name`
    /// - Whatever the factory reports for an invalid configuration
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn RemoteStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Remote store '{}' is not registered", name)))?;
        factory(config)
    }

    /// Get list of registered store names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a store is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for RemoteStoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in stores (`memory`, `http`).
pub fn create_default_registry() -> RemoteStoreRegistry {
    let mut factories: HashMap<String, RemoteStoreFactory> = HashMap::new();

    factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(crate::memory::MemoryRemoteStore::new()))),
    );

    factories.insert(
        "http".to_string(),
        Box::new(|config| {
            let base_url = config
                .get("base_url")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    Error::InvalidInput("HTTP remote store requires 'base_url'".to_string())
                })?;
            let token = config
                .get("token")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok(Arc::new(crate::http::HttpRemoteStore::new(base_url, token)?))
        }),
    );

    RemoteStoreRegistry { factories }
}
