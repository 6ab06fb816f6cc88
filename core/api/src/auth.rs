//! Authentication providers for the backend API.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use url::Url;

use starsync_common::{Error, Result};

/// Source of bearer tokens for backend calls.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The token to attach to the next request, if any is known.
    async fn current_token(&self) -> Option<String>;

    /// Obtain a fresh token, replacing the current one.
    ///
    /// # Errors
    /// - `Authentication` if the backend refused the handshake
    /// - `RemoteUnavailable` if it could not be reached
    async fn reauthenticate(&self) -> Result<String>;
}

/// Fixed token that never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticToken {
    token: Option<String>,
}

impl StaticToken {
    /// Create a provider handing out `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider without any token.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthProvider for StaticToken {
    async fn current_token(&self) -> Option<String> {
        self.token.clone()
    }

    async fn reauthenticate(&self) -> Result<String> {
        self.token
            .clone()
            .ok_or_else(|| Error::Authentication("No token configured".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    user_id: &'a str,
    user_data: &'a Value,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

/// Token handshake against the game backend's `api/auth` endpoint.
///
/// The handshake posts the player id and profile data and keeps the token
/// the backend returns. It talks to the backend directly, never through the
/// API client, so a failing handshake cannot recurse into another one.
pub struct BackendAuth {
    http: Client,
    auth_url: Url,
    user_id: String,
    user_data: Value,
    token: RwLock<Option<String>>,
}

impl BackendAuth {
    /// Create a provider for `user_id` against the API rooted at `base_url`.
    pub fn new(base_url: &Url, user_id: impl Into<String>, user_data: Value) -> Result<Self> {
        let auth_url = base_url
            .join("api/auth")
            .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?;
        let http = Client::builder()
            .user_agent("StarSync/0.1")
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            auth_url,
            user_id: user_id.into(),
            user_data,
            token: RwLock::new(None),
        })
    }

    /// The player id this provider authenticates as.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[async_trait]
impl AuthProvider for BackendAuth {
    async fn current_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn reauthenticate(&self) -> Result<String> {
        let mut token = self.token.write().await;

        info!("Authenticating player {}", self.user_id);

        let body = AuthRequest {
            user_id: &self.user_id,
            user_data: &self.user_data,
            timestamp: Utc::now().timestamp_millis(),
        };

        let response = self
            .http
            .post(self.auth_url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("Authentication request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "Backend refused authentication with {}",
                status
            )));
        }

        let parsed: AuthResponse = response
            .json()
            .await
            .map_err(|e| Error::Authentication(format!("Malformed auth response: {}", e)))?;

        *token = Some(parsed.token.clone());
        Ok(parsed.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let auth = StaticToken::new("abc");
        assert_eq!(auth.current_token().await.as_deref(), Some("abc"));
        assert_eq!(auth.reauthenticate().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_anonymous_cannot_reauthenticate() {
        let auth = StaticToken::anonymous();
        assert!(auth.current_token().await.is_none());
        assert!(matches!(
            auth.reauthenticate().await,
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn test_auth_request_shape() {
        let data = serde_json::json!({"first_name": "Ann"});
        let body = AuthRequest {
            user_id: "42",
            user_data: &data,
            timestamp: 1,
        };
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(encoded["userId"], "42");
        assert_eq!(encoded["userData"]["first_name"], "Ann");
    }

    #[tokio::test]
    async fn test_backend_auth_url() {
        let base = Url::parse("https://example.com/server/").unwrap();
        let auth = BackendAuth::new(&base, "42", Value::Null).unwrap();
        assert_eq!(auth.auth_url.as_str(), "https://example.com/server/api/auth");
        assert_eq!(auth.user_id(), "42");
        assert!(auth.current_token().await.is_none());
    }
}
