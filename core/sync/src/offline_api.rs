//! API calls that degrade to the offline queue.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use starsync_api::{ApiExecutor, ApiRequest};
use starsync_common::{QueuedCallId, Result};

use crate::connectivity::Connectivity;
use crate::queue::OfflineQueue;

/// Result of an [`OfflineApi::call`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The backend answered.
    Delivered(Value),
    /// The call was queued for later delivery.
    Queued(QueuedCallId),
}

impl CallOutcome {
    /// Response body, if the call was delivered.
    pub fn response(&self) -> Option<&Value> {
        match self {
            CallOutcome::Delivered(value) => Some(value),
            CallOutcome::Queued(_) => None,
        }
    }

    /// Check if the call ended up in the queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, CallOutcome::Queued(_))
    }
}

/// Backend access that queues calls while the backend is unreachable.
#[derive(Clone)]
pub struct OfflineApi {
    executor: Arc<dyn ApiExecutor>,
    queue: Arc<OfflineQueue>,
    connectivity: Connectivity,
}

impl OfflineApi {
    pub fn new(
        executor: Arc<dyn ApiExecutor>,
        queue: Arc<OfflineQueue>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            executor,
            queue,
            connectivity,
        }
    }

    /// Deliver `request` now, or queue it.
    ///
    /// Offline, the call is queued without being attempted. Online, a
    /// transport failure queues it once; any other error (an HTTP status
    /// the backend chose to return) is handed back to the caller.
    ///
    /// # Errors
    /// - `Http` / `Authentication` for calls the backend rejected
    /// - `LocalStore` if a call had to be queued and the queue could not
    ///   be persisted
    pub async fn call(&self, request: ApiRequest) -> Result<CallOutcome> {
        if !self.connectivity.is_online() {
            debug!("Offline, queueing {}", request);
            let id = self.queue.enqueue(request).await?;
            return Ok(CallOutcome::Queued(id));
        }

        match self.executor.call(&request).await {
            Ok(value) => Ok(CallOutcome::Delivered(value)),
            Err(e) if e.is_transient() => {
                warn!("{} failed, queueing for retry: {}", request, e);
                let id = self.queue.enqueue(request).await?;
                Ok(CallOutcome::Queued(id))
            }
            Err(e) => Err(e),
        }
    }

    /// The queue backing this API.
    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use starsync_common::Error;
    use starsync_storage::MemoryLocalStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Executor that always returns the configured result.
    struct FixedExecutor {
        result: fn() -> Result<Value>,
        calls: AtomicUsize,
    }

    impl FixedExecutor {
        fn new(result: fn() -> Result<Value>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ApiExecutor for FixedExecutor {
        async fn call(&self, _request: &ApiRequest) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn api(executor: Arc<FixedExecutor>, online: bool) -> OfflineApi {
        let local = Arc::new(MemoryLocalStore::new());
        let queue = Arc::new(OfflineQueue::load(local).unwrap());
        OfflineApi::new(executor, queue, Connectivity::new(online))
    }

    #[tokio::test]
    async fn test_online_call_delivered() {
        let executor = FixedExecutor::new(|| Ok(json!({"stars": 120})));
        let api = api(executor.clone(), true);

        let outcome = api.call(ApiRequest::get("user/stats")).await.unwrap();
        assert_eq!(outcome.response().unwrap()["stars"], 120);
        assert!(api.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_offline_call_queued_once_without_attempt() {
        let executor = FixedExecutor::new(|| Ok(Value::Null));
        let api = api(executor.clone(), false);

        let outcome = api
            .call(ApiRequest::post("nft/buy", json!({"nftId": "siber"})))
            .await
            .unwrap();

        assert!(outcome.is_queued());
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_queued() {
        let executor =
            FixedExecutor::new(|| Err(Error::RemoteUnavailable("connection refused".into())));
        let api = api(executor.clone(), true);

        let outcome = api.call(ApiRequest::get("leaderboard")).await.unwrap();
        assert!(outcome.is_queued());
        assert_eq!(api.queue().len().await, 1);
    }

    #[tokio::test]
    async fn test_http_error_propagates() {
        let executor = FixedExecutor::new(|| {
            Err(Error::Http {
                status: 400,
                message: "bad request".into(),
            })
        });
        let api = api(executor.clone(), true);

        let err = api.call(ApiRequest::get("shop/items")).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(api.queue().is_empty().await);
    }
}
