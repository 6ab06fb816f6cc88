//! Backend API access for StarSync.
//!
//! This module provides:
//! - The [`ApiExecutor`] contract used for direct calls and queue replay
//! - An HTTP executor that re-authenticates once on `401`
//! - Auth providers (backend handshake, static token)
//! - Request builders for the game backend's endpoints

pub mod auth;
pub mod config;
pub mod executor;
pub mod http;
pub mod request;
pub mod routes;

pub use auth::{AuthProvider, BackendAuth, StaticToken};
pub use config::ApiConfig;
pub use executor::ApiExecutor;
pub use http::HttpApiClient;
pub use request::{ApiRequest, HttpMethod};
pub use routes::Routes;
