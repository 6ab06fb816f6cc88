//! Backend API configuration.

use serde::{Deserialize, Serialize};

/// Where the backend lives and who the player is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint is resolved against.
    pub base_url: String,
    /// Player id. Generated by the client when not configured.
    pub user_id: Option<String>,
    /// Extra player data sent along with the auth handshake.
    pub user_data: serde_json::Value,
    /// Fixed bearer token. When set, the auth handshake is skipped.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/server/".to_string(),
            user_id: None,
            user_data: serde_json::Value::Null,
            token: None,
        }
    }
}
