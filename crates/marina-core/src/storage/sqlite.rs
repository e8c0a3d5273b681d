//! `SQLite`-backed storage gateway.
//!
//! All kinds share one `entities` table. Documents are stored as JSON text
//! and enumerated in insertion order (`seq`). Filters are evaluated on the
//! decoded documents so that the matching rules are identical to the
//! in-memory backend.

// SQLite returns i64 for row IDs and versions, but they're always
// non-negative.
#![allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;

use super::{
    BoxFuture, Entity, EntityId, StorageError, StorageGateway, ensure_object, field_matches,
    unique_value,
};

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
CREATE TABLE IF NOT EXISTS entities (
    seq     INTEGER PRIMARY KEY AUTOINCREMENT,
    kind    TEXT    NOT NULL,
    id      TEXT    NOT NULL UNIQUE,
    version INTEGER NOT NULL,
    data    TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_kind_seq ON entities (kind, seq);
";

/// Gateway persisting entities to a `SQLite` database.
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGateway")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Raw row shape before the document is decoded.
type RawRow = (String, i64, String);

impl SqliteGateway {
    /// Opens or creates a database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a gateway over a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the database path, or `None` for in-memory databases.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `f` against the connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            f(&mut *conn)
        })
        .await?
    }

    fn load_kind(conn: &Connection, kind: &str) -> Result<Vec<Entity>, StorageError> {
        let mut stmt =
            conn.prepare("SELECT id, version, data FROM entities WHERE kind = ?1 ORDER BY seq")?;
        let rows = stmt
            .query_map(params![kind], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<RawRow>, _>>()?;
        rows.into_iter().map(decode_row).collect()
    }

    fn load_one(conn: &Connection, kind: &str, id: &EntityId) -> Result<Entity, StorageError> {
        let row: Option<RawRow> = conn
            .query_row(
                "SELECT id, version, data FROM entities WHERE kind = ?1 AND id = ?2",
                params![kind, id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        row.map_or_else(
            || {
                Err(StorageError::NotFound {
                    kind: kind.to_string(),
                    id: id.to_string(),
                })
            },
            decode_row,
        )
    }

    fn ensure_unique(
        conn: &Connection,
        kind: &str,
        key: &str,
        value: &Value,
        skip: Option<&EntityId>,
    ) -> Result<(), StorageError> {
        let existing = Self::load_kind(conn, kind)?;
        match existing
            .iter()
            .filter(|e| Some(&e.id) != skip)
            .find(|e| field_matches(&e.data, key, value))
        {
            Some(entity) => Err(StorageError::UniqueViolation {
                kind: kind.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                existing_id: entity.id.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn insert(conn: &Connection, kind: &str, data: Value) -> Result<Entity, StorageError> {
        let entity = Entity {
            id: EntityId::generate(),
            version: 1,
            data,
        };
        conn.execute(
            "INSERT INTO entities (kind, id, version, data) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind,
                entity.id.as_str(),
                entity.version as i64,
                serde_json::to_string(&entity.data)?,
            ],
        )?;
        Ok(entity)
    }

    /// Conditional overwrite inside one `IMMEDIATE` transaction.
    fn replace(
        conn: &mut Connection,
        kind: &str,
        id: &EntityId,
        data: Value,
        expected_version: Option<u64>,
        unique_key: Option<&str>,
    ) -> Result<Entity, StorageError> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = Self::load_one(&tx, kind, id)?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(StorageError::VersionConflict {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }
        if let Some(key) = unique_key {
            Self::ensure_unique(&tx, kind, key, unique_value(&data, key)?, Some(id))?;
        }

        let version = current.version + 1;
        tx.execute(
            "UPDATE entities SET version = ?1, data = ?2 WHERE kind = ?3 AND id = ?4",
            params![
                version as i64,
                serde_json::to_string(&data)?,
                kind,
                id.as_str()
            ],
        )?;
        tx.commit()?;

        Ok(Entity {
            id: id.clone(),
            version,
            data,
        })
    }
}

fn decode_row((id, version, data): RawRow) -> Result<Entity, StorageError> {
    Ok(Entity {
        id: EntityId::from(id),
        version: version as u64,
        data: serde_json::from_str(&data)?,
    })
}

impl StorageGateway for SqliteGateway {
    fn get_all_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Entity>, StorageError>> {
        let kind = kind.to_string();
        Box::pin(async move { self.run(move |conn| Self::load_kind(conn, &kind)).await })
    }

    fn create_entity<'a>(
        &'a self,
        kind: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        let kind = kind.to_string();
        Box::pin(async move {
            ensure_object(&data)?;
            self.run(move |conn| Self::insert(conn, &kind, data)).await
        })
    }

    fn create_unique_entity<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        let (kind, key) = (kind.to_string(), key.to_string());
        Box::pin(async move {
            ensure_object(&data)?;
            let value = unique_value(&data, &key)?.clone();

            self.run(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                Self::ensure_unique(&tx, &kind, &key, &value, None)?;
                let entity = Self::insert(&tx, &kind, data)?;
                tx.commit()?;
                Ok(entity)
            })
            .await
        })
    }

    fn get_entity_by_id<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        let (kind, id) = (kind.to_string(), id.clone());
        Box::pin(async move { self.run(move |conn| Self::load_one(conn, &kind, &id)).await })
    }

    fn update_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
        data: Value,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        let (kind, id) = (kind.to_string(), id.clone());
        Box::pin(async move {
            ensure_object(&data)?;
            self.run(move |conn| Self::replace(conn, &kind, &id, data, expected_version, None))
                .await
        })
    }

    fn update_unique_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
        key: &'a str,
        data: Value,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        let (kind, id, key) = (kind.to_string(), id.clone(), key.to_string());
        Box::pin(async move {
            ensure_object(&data)?;
            self.run(move |conn| {
                Self::replace(conn, &kind, &id, data, expected_version, Some(key.as_str()))
            })
            .await
        })
    }

    fn delete_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        let (kind, id) = (kind.to_string(), id.clone());
        Box::pin(async move {
            self.run(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM entities WHERE kind = ?1 AND id = ?2",
                    params![kind, id.as_str()],
                )?;
                if removed == 0 {
                    return Err(StorageError::NotFound {
                        kind,
                        id: id.to_string(),
                    });
                }
                Ok(())
            })
            .await
        })
    }

    fn first_entity_by_filter<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            let entities = self.get_all_of_kind(kind).await?;
            entities
                .into_iter()
                .find(|e| field_matches(&e.data, key, value))
                .ok_or_else(|| StorageError::NoneMatched {
                    kind: kind.to_string(),
                    key: key.to_string(),
                })
        })
    }

    fn filter_entities<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Vec<Vec<Entity>>, StorageError>> {
        Box::pin(async move {
            let entities = self.get_all_of_kind(kind).await?;
            let page: Vec<Entity> = entities
                .into_iter()
                .filter(|e| field_matches(&e.data, key, value))
                .collect();
            Ok(vec![page])
        })
    }
}
