//! Storage gateway for marina entities.
//!
//! The gateway is a generic document store keyed by an entity *kind* and an
//! opaque id. Every side effect performed by the slip engines goes through
//! the [`StorageGateway`] trait, so backends can be swapped without touching
//! the occupancy logic.
//!
//! # Backends
//!
//! - [`InMemoryGateway`]: insertion-ordered, lock-protected maps. Used by
//!   tests and as the default backend.
//! - [`SqliteGateway`]: a single `entities` table in `SQLite` with WAL mode.
//!   Database calls run on the blocking thread pool.
//!
//! # Concurrency
//!
//! Each individual call is atomic. Multi-step read-modify-write sequences are
//! protected by the optimistic `version` carried on every [`Entity`]: an
//! update that names an `expected_version` fails with
//! [`StorageError::VersionConflict`] if another writer got there first.
//!
//! # Example
//!
//! ```rust
//! use marina_core::storage::{InMemoryGateway, StorageGateway};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), marina_core::storage::StorageError> {
//! let gateway = InMemoryGateway::new();
//! let created = gateway.create_entity("slip", json!({"number": 5})).await?;
//! let found = gateway.get_entity_by_id("slip", &created.id).await?;
//! assert_eq!(found.version, 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod sqlite;


use std::fmt;
use std::future::Future;
use std::pin::Pin;

pub use error::StorageError;
pub use memory::InMemoryGateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
pub use sqlite::SqliteGateway;

/// Boxed future returned by gateway operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque identifier assigned by the gateway when an entity is created.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generates a fresh identifier. Identifiers are never reused.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored document together with its identity and version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Gateway-assigned identifier.
    pub id: EntityId,

    /// Optimistic concurrency token. Starts at 1 and increments on every
    /// update.
    pub version: u64,

    /// The document body. Always a JSON object.
    pub data: Value,
}

/// Generic persistence operations keyed by entity kind and id.
///
/// Implementations must be safe to share across tasks; the engines hold the
/// gateway behind an `Arc<dyn StorageGateway>` and fan out concurrent calls
/// during reconciliation.
pub trait StorageGateway: Send + Sync {
    /// Returns every entity of `kind` in the backend's enumeration order.
    fn get_all_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Entity>, StorageError>>;

    /// Stores a new document and assigns it an id.
    fn create_entity<'a>(
        &'a self,
        kind: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Stores a new document unless another entity of `kind` already carries
    /// the same value under `key`. The check and the insert are atomic.
    fn create_unique_entity<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Loads a single entity.
    fn get_entity_by_id<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Replaces the document stored under `id`.
    ///
    /// When `expected_version` is `Some`, the write only succeeds if the
    /// stored version still matches.
    fn update_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
        data: Value,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Replaces the document stored under `id` unless another entity of
    /// `kind` already carries the new document's value under `key`.
    ///
    /// The version check, the uniqueness check and the write are atomic.
    /// The entity being replaced never collides with itself.
    fn update_unique_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
        key: &'a str,
        data: Value,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Removes an entity.
    fn delete_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Returns the first entity (in enumeration order) whose `key` equals
    /// `value`, or [`StorageError::NoneMatched`].
    fn first_entity_by_filter<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>>;

    /// Returns every entity whose `key` equals `value`, wrapped in result
    /// pages. Callers must treat an empty outer list as "no matches".
    fn filter_entities<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Vec<Vec<Entity>>, StorageError>>;
}

/// Returns `true` if `data[key]` exists and equals `value`.
pub(crate) fn field_matches(data: &Value, key: &str, value: &Value) -> bool {
    data.get(key).is_some_and(|field| field == value)
}

/// Rejects documents that are not JSON objects.
pub(crate) fn ensure_object(data: &Value) -> Result<(), StorageError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StorageError::InvalidDocument {
            reason: "document must be a JSON object".to_string(),
        })
    }
}

/// Extracts the value a unique creation is keyed on.
pub(crate) fn unique_value<'v>(data: &'v Value, key: &str) -> Result<&'v Value, StorageError> {
    data.get(key).ok_or_else(|| StorageError::InvalidDocument {
        reason: format!("unique key '{key}' is missing from the document"),
    })
}
