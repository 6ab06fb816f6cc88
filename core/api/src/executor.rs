//! Remote API call executor contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::request::ApiRequest;
use starsync_common::Result;

/// Delivers backend calls.
///
/// Used both for direct online calls and for replaying the offline queue.
/// Implementations own authentication: a `401` must trigger exactly one
/// re-authentication and retry before it is reported as a hard failure.
#[async_trait]
pub trait ApiExecutor: Send + Sync {
    /// Execute `request` and return the decoded JSON response
    /// (`Value::Null` for an empty body).
    ///
    /// # Errors
    /// - `RemoteUnavailable` when the request never reached the backend
    /// - `Http { status }` when the backend answered with a failure status
    async fn call(&self, request: &ApiRequest) -> Result<Value>;
}
