//! HTTP implementation of the API executor.

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::auth::AuthProvider;
use crate::executor::ApiExecutor;
use crate::request::{ApiRequest, HttpMethod};
use starsync_common::{normalize_base_url, Error, Result};

const UNAUTHORIZED: u16 = 401;

/// JSON-over-HTTP client for the game backend.
pub struct HttpApiClient {
    http: Client,
    base_url: Url,
    auth: Arc<dyn AuthProvider>,
}

impl HttpApiClient {
    /// Create a new client for the API rooted at `base_url`.
    ///
    /// # Errors
    /// - `InvalidInput` if `base_url` cannot be parsed
    pub fn new(base_url: &str, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .user_agent("StarSync/0.1")
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    /// Base URL every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check whether the backend answers at all.
    pub async fn ping(&self) -> bool {
        let Ok(url) = endpoint_url(&self.base_url, "ping") else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Ping failed: {}", e);
                false
            }
        }
    }

    /// Send `request` once, without any re-authentication.
    async fn send(&self, request: &ApiRequest) -> Result<Value> {
        let url = endpoint_url(&self.base_url, &request.endpoint)?;

        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), url)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = self.auth.current_token().await {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("{} failed: {}", request, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("{} body: {}", request, e)))?;
        parse_body(&body)
    }
}

#[async_trait]
impl ApiExecutor for HttpApiClient {
    async fn call(&self, request: &ApiRequest) -> Result<Value> {
        call_with_reauth(self.auth.as_ref(), || self.send(request)).await
    }
}

/// Run `send`, and on a `401` re-authenticate once and run it again.
///
/// The second attempt's outcome is final: another `401` is reported as is.
pub(crate) async fn call_with_reauth<F, Fut>(auth: &dyn AuthProvider, send: F) -> Result<Value>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    match send().await {
        Err(err) if err.status() == Some(UNAUTHORIZED) => {
            warn!("Backend rejected token, re-authenticating");
            auth.reauthenticate().await?;
            send().await
        }
        other => other,
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Resolve an endpoint (with or without a leading slash) below `base`.
pub(crate) fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url> {
    base.join(endpoint.trim_start_matches('/'))
        .map_err(|e| Error::InvalidInput(format!("Invalid endpoint '{}': {}", endpoint, e)))
}

fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| Error::Serialization(format!("Bad API response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unauthorized() -> Error {
        Error::Http {
            status: 401,
            message: "Unauthorized".to_string(),
        }
    }

    #[test]
    fn test_endpoint_url_strips_leading_slash() {
        let base = normalize_base_url("https://example.com/server").unwrap();
        let url = endpoint_url(&base, "/users/42/battles?limit=20").unwrap();
        assert_eq!(url.as_str(), "https://example.com/server/users/42/battles?limit=20");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body(r#"{"ok":true}"#).unwrap()["ok"], true);
        assert!(matches!(parse_body("<html>"), Err(Error::Serialization(_))));
    }

    #[tokio::test]
    async fn test_reauth_once_then_succeed() {
        let attempts = AtomicU32::new(0);
        let auth = StaticToken::new("fresh");

        let result = call_with_reauth(&auth, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(unauthorized())
                } else {
                    Ok(serde_json::json!({"ok": true}))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap()["ok"], true);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_unauthorized_is_final() {
        let attempts = AtomicU32::new(0);
        let auth = StaticToken::new("still-bad");

        let result = call_with_reauth(&auth, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(unauthorized()) }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(401));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let attempts = AtomicU32::new(0);
        let auth = StaticToken::new("token");

        let result = call_with_reauth(&auth, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Http {
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reauth_propagates() {
        let attempts = AtomicU32::new(0);
        let auth = StaticToken::anonymous();

        let result = call_with_reauth(&auth, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(unauthorized()) }
        })
        .await;

        assert!(matches!(result, Err(Error::Authentication(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
