//! StarSync sync layer
//!
//! This module keeps game data usable without a backend, including:
//! - A dual key-value store that writes locally first and remotely when it can
//! - A persisted map of writes the remote has not confirmed yet
//! - A durable FIFO queue of backend calls made while offline
//! - A connectivity signal and an engine that replays both on reconnect

pub mod connectivity;
pub mod dual_store;
pub mod engine;
pub mod offline_api;
pub mod pending;
pub mod queue;

// Re-export main types
pub use connectivity::{Connectivity, ConnectivityState};
pub use dual_store::{DualStore, ReconcileReport};
pub use engine::{MonitorHandle, SyncConfig, SyncEngine, SyncReport, SyncStatus};
pub use offline_api::{CallOutcome, OfflineApi};
pub use pending::{pending_sync_key, PendingSync};
pub use queue::{api_queue_key, DrainReport, OfflineQueue, QueuedCall};
