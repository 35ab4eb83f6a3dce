//! The remote API the engine replays against.
//!
//! A minimal resource-oriented contract: list, get, create, update, delete
//! and a server-side batch generator. Every failure is a [`RemoteError`];
//! the facade and the sync coordinator treat all of them as transient.

mod http;

pub use http::HttpRemote;

use crate::{Fields, Record, RecordId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from a remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found")]
    NotFound,

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("remote unreachable")]
    Unreachable,
}

impl RemoteError {
    /// Check if the remote reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }
}

/// Result type for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// The authoritative remote store for one resource collection.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// All records.
    async fn list(&self) -> RemoteResult<Vec<Record>>;

    /// One record, `None` if the remote does not know the id.
    async fn get(&self, id: &RecordId) -> RemoteResult<Option<Record>>;

    /// Create a record from `fields`. The remote assigns the id.
    async fn create(&self, fields: &Fields) -> RemoteResult<Record>;

    /// Apply a partial update. Returns the record as the remote now holds it.
    async fn update(&self, id: &RecordId, changes: &Fields) -> RemoteResult<Record>;

    /// Delete a record. A missing id is [`RemoteError::NotFound`].
    async fn delete(&self, id: &RecordId) -> RemoteResult<()>;

    /// Ask the remote to generate and store a batch of records.
    async fn generate_batch(&self) -> RemoteResult<Vec<Record>>;
}
