//! Storage gateway error types.

use thiserror::Error;

/// Errors surfaced by a [`StorageGateway`](super::StorageGateway) backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No entity with this id exists for the kind.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The entity kind.
        kind: String,
        /// The id that was requested.
        id: String,
    },

    /// A filtered lookup matched nothing.
    #[error("no {kind} matched filter on '{key}'")]
    NoneMatched {
        /// The entity kind.
        kind: String,
        /// The filtered field.
        key: String,
    },

    /// The stored version moved on since the caller read the entity.
    #[error("version conflict on {kind} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The entity kind.
        kind: String,
        /// The entity id.
        id: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A unique write collided with an existing entity.
    #[error("{kind} with {key} = {value} already exists: {existing_id}")]
    UniqueViolation {
        /// The entity kind.
        kind: String,
        /// The unique field.
        key: String,
        /// The colliding value, rendered as JSON.
        value: String,
        /// Id of the entity already holding the value.
        existing_id: String,
    },

    /// The document handed to the gateway is malformed.
    #[error("invalid document: {reason}")]
    InvalidDocument {
        /// Why the document was rejected.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// The blocking task running a database call panicked or was cancelled.
    #[error("blocking storage task failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Returns `true` for failures a caller may resolve by re-reading and
    /// retrying.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
