//! Client configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use starsync_api::ApiConfig;
use starsync_game::GameConfig;
use starsync_sync::SyncConfig;

/// File holding the generated player id inside the data directory.
const USER_ID_FILE: &str = "user_id";

/// Which remote store backs the dual store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Registered store name (`http` or `memory`).
    pub provider: String,
    /// Provider-specific settings.
    pub config: Value,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            provider: "http".to_string(),
            config: Value::Null,
        }
    }
}

impl RemoteConfig {
    /// Provider settings, with the HTTP store defaulting to the API base URL.
    pub fn resolved(&self, api: &ApiConfig) -> Value {
        let mut config = match &self.config {
            Value::Object(fields) => fields.clone(),
            _ => serde_json::Map::new(),
        };
        if self.provider == "http" {
            config
                .entry("base_url")
                .or_insert_with(|| Value::String(api.base_url.clone()));
            if let Some(token) = &api.token {
                config
                    .entry("token")
                    .or_insert_with(|| Value::String(token.clone()));
            }
        }
        Value::Object(config)
    }
}

/// Everything the client can be configured with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Directory of the local store. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
    pub api: ApiConfig,
    pub remote: RemoteConfig,
    pub game: GameConfig,
    pub sync: SyncConfig,
}

impl ClientConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("starsync").join("config.json"))
    }

    /// Load `path`, or the default location when `path` is `None`.
    ///
    /// An explicitly given file must exist; a missing default file yields
    /// the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Local store directory.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("starsync"))
                .unwrap_or_else(|| PathBuf::from(".starsync"))
        })
    }

    /// Configured player id, or one generated on first use and kept in
    /// `data_dir`.
    pub fn user_id(&self, data_dir: &Path) -> Result<String> {
        if let Some(id) = &self.api.user_id {
            return Ok(id.clone());
        }

        let path = data_dir.join(USER_ID_FILE);
        if path.exists() {
            let id = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        std::fs::write(&path, &id)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Generated player id {}", id);
        Ok(id)
    }
}
