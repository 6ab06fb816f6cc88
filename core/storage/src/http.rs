//! HTTP-backed cloud key-value store.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::provider::RemoteStore;
use starsync_common::{normalize_base_url, Error, Result, StoreKey};

/// Body exchanged with the storage endpoint.
#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: String,
}

/// Remote store speaking a minimal JSON API:
///
/// - `GET {base}/storage/{key}` → `{"value": "..."}` or `404`
/// - `PUT {base}/storage/{key}` with `{"value": "..."}`
pub struct HttpRemoteStore {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpRemoteStore {
    /// Create a new HTTP store.
    ///
    /// # Errors
    /// - `InvalidInput` if `base_url` cannot be parsed
    /// - `RemoteUnavailable` if the HTTP client cannot be built
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .user_agent("StarSync/0.1")
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }
}

/// URL of the storage resource for `key`.
pub(crate) fn storage_url(base: &Url, key: &StoreKey) -> Result<Url> {
    let encoded = utf8_percent_encode(key.as_str(), NON_ALPHANUMERIC).to_string();
    base.join(&format!("storage/{}", encoded))
        .map_err(|e| Error::InvalidInput(format!("Invalid key URL for {}: {}", key, e)))
}

/// Map a non-success status onto the store's error contract.
fn status_error(status: StatusCode, key: &StoreKey) -> Error {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Error::RemoteUnavailable(format!("Storage backend returned {} for {}", status, key))
    } else {
        Error::Http {
            status: status.as_u16(),
            message: format!("Storage request for {} rejected", key),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<String>> {
        let url = storage_url(&self.base_url, key)?;
        let response = self
            .request(self.http.get(url))
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to get {}: {}", key, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Remote has no value for {}", key);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, key));
        }

        let body: StoredValue = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Bad storage response: {}", e)))?;
        Ok(Some(body.value))
    }

    async fn set(&self, key: &StoreKey, value: &str) -> Result<()> {
        let url = storage_url(&self.base_url, key)?;
        let body = StoredValue {
            value: value.to_string(),
        };

        let response = self
            .request(self.http.put(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to set {}: {}", key, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, key));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_url_encodes_key() {
        let base = normalize_base_url("https://example.com/server/").unwrap();
        let key = StoreKey::new("battle history").unwrap();
        let url = storage_url(&base, &key).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/server/storage/battle%20history"
        );
    }

    #[test]
    fn test_invalid_base_rejected() {
        assert!(matches!(
            HttpRemoteStore::new("not a url", None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        let key = StoreKey::new("stars").unwrap();
        assert!(status_error(StatusCode::BAD_GATEWAY, &key).is_transient());
        assert_eq!(status_error(StatusCode::FORBIDDEN, &key).status(), Some(403));
    }
}
