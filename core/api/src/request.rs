//! Backend request description shared by direct calls and the offline queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use starsync_common::Error;

/// HTTP verb of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(Error::InvalidInput(format!("Unknown HTTP method: {}", other))),
        }
    }
}

/// A single backend call: verb, endpoint relative to the API base, and an
/// optional JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ApiRequest {
    /// Create a request.
    pub fn new(method: HttpMethod, endpoint: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            payload,
        }
    }

    /// `GET` without a body.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, endpoint, None)
    }

    /// `POST` with a JSON body.
    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(HttpMethod::Post, endpoint, Some(payload))
    }

    /// `PUT` with a JSON body.
    pub fn put(endpoint: impl Into<String>, payload: Value) -> Self {
        Self::new(HttpMethod::Put, endpoint, Some(payload))
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("DELETE".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_request_serialization() {
        let request = ApiRequest::post("battle/result", json!({"won": true}));
        let encoded = serde_json::to_value(&request).unwrap();

        assert_eq!(encoded["method"], "POST");
        assert_eq!(encoded["endpoint"], "battle/result");
        assert_eq!(encoded["payload"]["won"], true);
    }

    #[test]
    fn test_request_without_payload() {
        let request: ApiRequest =
            serde_json::from_str(r#"{"method":"GET","endpoint":"shop/items"}"#).unwrap();
        assert_eq!(request, ApiRequest::get("shop/items"));
        assert_eq!(request.to_string(), "GET shop/items");
    }
}
