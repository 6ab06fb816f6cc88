//! Key-value store abstraction for StarSync.
//!
//! This module provides the two store contracts the sync layer builds on:
//! a synchronous, always-available [`LocalStore`] and an async, fallible
//! [`RemoteStore`]. Concrete backends (memory, filesystem, HTTP) and a
//! registry for resolving remote backends by name live alongside.

pub mod http;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use http::HttpRemoteStore;
pub use local::FileLocalStore;
pub use memory::{MemoryLocalStore, MemoryRemoteStore};
pub use provider::{LocalStore, RemoteStore};
pub use registry::{create_default_registry, RemoteStoreFactory, RemoteStoreRegistry};
