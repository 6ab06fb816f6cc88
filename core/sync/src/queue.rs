//! Durable queue of API calls that could not be delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use starsync_api::{ApiExecutor, ApiRequest, HttpMethod};
use starsync_common::{Error, QueuedCallId, Result, StoreKey};
use starsync_storage::LocalStore;

/// Local-store key holding the persisted queue.
pub fn api_queue_key() -> StoreKey {
    StoreKey::reserved("api_queue")
}

/// A backend call waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCall {
    /// Unique, strictly increasing id.
    pub id: QueuedCallId,
    /// The call itself.
    pub request: ApiRequest,
    /// When the call was queued.
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Calls delivered and removed, in enqueue order.
    pub succeeded: Vec<QueuedCallId>,
    /// Calls that failed and stay queued, in enqueue order.
    pub failed: Vec<QueuedCallId>,
    /// Queue length after the pass.
    pub remaining: usize,
}

/// Persisted queue layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueState {
    next_id: QueuedCallId,
    calls: Vec<QueuedCall>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            next_id: QueuedCallId::new(1),
            calls: Vec::new(),
        }
    }
}

impl QueueState {
    fn load(local: &dyn LocalStore) -> Result<Self> {
        let Some(raw) = local.get(&api_queue_key())? else {
            return Ok(Self::default());
        };

        match serde_json::from_str::<QueueState>(&raw) {
            Ok(mut state) => {
                // Never hand out an id at or below one already queued.
                if let Some(max) = state.calls.iter().map(|c| c.id).max() {
                    if state.next_id <= max {
                        state.next_id = max.next();
                    }
                }
                Ok(state)
            }
            Err(e) => {
                warn!("Discarding malformed API queue: {}", e);
                Ok(Self::default())
            }
        }
    }

    fn persist(&self, local: &dyn LocalStore) -> Result<()> {
        let json =
            serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))?;
        local.set(&api_queue_key(), &json)
    }
}

/// FIFO queue of undelivered API calls, persisted in the local store.
///
/// Failed calls stay queued indefinitely; there is no retry cap and no
/// backoff. Callers watching queue growth can use [`OfflineQueue::len`].
pub struct OfflineQueue {
    local: Arc<dyn LocalStore>,
    state: Mutex<QueueState>,
    /// Single-flight guard for drain passes.
    draining: Mutex<()>,
}

impl OfflineQueue {
    /// Load the queue left by a previous run (or start empty).
    ///
    /// # Errors
    /// - `LocalStore` if the persisted queue cannot be read
    pub fn load(local: Arc<dyn LocalStore>) -> Result<Self> {
        let state = QueueState::load(local.as_ref())?;
        if !state.calls.is_empty() {
            info!("Loaded {} queued API calls", state.calls.len());
        }

        Ok(Self {
            local,
            state: Mutex::new(state),
            draining: Mutex::new(()),
        })
    }

    /// Append a call and persist the queue.
    ///
    /// # Errors
    /// - `LocalStore` if the queue cannot be persisted; the call is then
    ///   not queued
    pub async fn enqueue(&self, request: ApiRequest) -> Result<QueuedCallId> {
        let mut state = self.state.lock().await;

        let id = state.next_id;
        let mut next = state.clone();
        next.calls.push(QueuedCall {
            id,
            request,
            enqueued_at: Utc::now(),
        });
        next.next_id = id.next();
        next.persist(self.local.as_ref())?;
        *state = next;

        debug!("Queued API call {}", id);
        Ok(id)
    }

    /// Convenience wrapper around [`OfflineQueue::enqueue`].
    pub async fn enqueue_call(
        &self,
        method: HttpMethod,
        endpoint: impl Into<String>,
        payload: Option<Value>,
    ) -> Result<QueuedCallId> {
        self.enqueue(ApiRequest::new(method, endpoint, payload)).await
    }

    /// Try to deliver every queued call, in enqueue order.
    ///
    /// The queue is snapshotted when the pass starts; calls enqueued while
    /// it runs are neither attempted nor lost. Delivered calls are removed
    /// by id after the pass, so the remaining calls keep their relative
    /// order.
    ///
    /// # Errors
    /// - `LocalStore` if the shortened queue cannot be persisted; the
    ///   delivered calls then stay queued and will be replayed again
    pub async fn drain(&self, executor: &dyn ApiExecutor) -> Result<DrainReport> {
        let _flight = self.draining.lock().await;

        let snapshot = self.state.lock().await.calls.clone();
        if snapshot.is_empty() {
            return Ok(DrainReport::default());
        }

        info!("Processing {} queued API calls", snapshot.len());

        let mut report = DrainReport::default();
        for call in &snapshot {
            match executor.call(&call.request).await {
                Ok(_) => report.succeeded.push(call.id),
                Err(e) => {
                    let failure = Error::QueueReplay {
                        id: call.id.get(),
                        reason: format!("{}: {}", call.request, e),
                    };
                    warn!("{}", failure);
                    report.failed.push(call.id);
                }
            }
        }

        let mut state = self.state.lock().await;
        if !report.succeeded.is_empty() {
            let delivered: HashSet<QueuedCallId> = report.succeeded.iter().copied().collect();
            let mut next = state.clone();
            next.calls.retain(|call| !delivered.contains(&call.id));
            next.persist(self.local.as_ref())?;
            *state = next;

            info!(
                "Successfully processed {} queued API calls",
                report.succeeded.len()
            );
        }
        report.remaining = state.calls.len();

        Ok(report)
    }

    /// Discard every queued call.
    ///
    /// Ids keep increasing afterwards; a cleared id is never reused.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let dropped = next.calls.len();
        next.calls.clear();
        next.persist(self.local.as_ref())?;
        *state = next;

        warn!("Cleared API queue ({} calls dropped)", dropped);
        Ok(())
    }

    /// Copy of the queued calls, in enqueue order.
    pub async fn calls(&self) -> Vec<QueuedCall> {
        self.state.lock().await.calls.clone()
    }

    /// Get count of queued calls.
    pub async fn len(&self) -> usize {
        self.state.lock().await.calls.len()
    }

    /// Check if nothing is queued.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.calls.is_empty()
    }
}
