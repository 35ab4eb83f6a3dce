//! Error types for the offsync engine.

use crate::{OperationId, RemoteError};
use thiserror::Error;

/// All possible errors surfaced by the engine.
///
/// Remote failures are normally absorbed by the facade and the sync
/// coordinator; only storage-layer failures and rejected payloads reach
/// callers in practice.
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Caller errors
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    // Queue invariants
    #[error("operation id collision: {0}")]
    OperationIdCollision(OperationId),

    // Remote errors (only returned from calls that have no local fallback)
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check if this error came from the local storage layer.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Io(_) | Error::Serialization(_) | Error::InvalidSnapshot(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
