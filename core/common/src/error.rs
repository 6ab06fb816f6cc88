//! Common error types for StarSync.

use thiserror::Error;

/// Top-level error type for StarSync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote backend or network is unreachable.
    ///
    /// The dual store absorbs this and degrades to the local path.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Resource not found on the remote side.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The local store rejected a read or write.
    ///
    /// The local store is the last line of durability, so this always
    /// propagates to the caller of the failing operation.
    #[error("Local store failure: {0}")]
    LocalStore(String),

    /// A backup blob could not be imported. State is left unchanged.
    #[error("Invalid import: {0}")]
    InvalidImport(String),

    /// A queued call could not be replayed.
    #[error("Queue replay failed for call {id}: {reason}")]
    QueueReplay { id: u64, reason: String },

    /// The remote API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Authentication with the backend failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Positional access outside of a sequence.
    #[error("Index {index} out of range for length {len}")]
    OutOfRange { index: usize, len: usize },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the failure is a transport problem the caller may recover
    /// from once connectivity returns.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RemoteUnavailable(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
