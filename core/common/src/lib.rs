//! Common utilities and types shared across StarSync modules.
//!
//! This module provides the error taxonomy and the small key/id types that
//! every other crate speaks.

pub mod base_url;
pub mod error;
pub mod types;

pub use base_url::normalize_base_url;
pub use error::{Error, Result};
pub use types::{QueuedCallId, StoreKey, RESERVED_PREFIX};
