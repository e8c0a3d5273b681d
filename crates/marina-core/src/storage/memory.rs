//! In-memory storage gateway.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    BoxFuture, Entity, EntityId, StorageError, StorageGateway, ensure_object, field_matches,
    unique_value,
};

/// Gateway backed by per-kind vectors held in memory.
///
/// Entities are enumerated in insertion order, which makes "first available"
/// lookups deterministic in tests.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    kinds: RwLock<HashMap<String, Vec<Entity>>>,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &str, id: &EntityId) -> StorageError {
    StorageError::NotFound {
        kind: kind.to_string(),
        id: id.to_string(),
    }
}

/// Rejects `value` under `key` if an entity other than `skip` holds it.
fn ensure_unique(
    entities: &[Entity],
    kind: &str,
    key: &str,
    value: &Value,
    skip: Option<&EntityId>,
) -> Result<(), StorageError> {
    match entities
        .iter()
        .filter(|e| Some(&e.id) != skip)
        .find(|e| field_matches(&e.data, key, value))
    {
        Some(existing) => Err(StorageError::UniqueViolation {
            kind: kind.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            existing_id: existing.id.to_string(),
        }),
        None => Ok(()),
    }
}

/// Overwrites `id` in place, checking the version and, if given, the
/// unique key. Callers hold the write lock.
fn replace(
    entities: &mut [Entity],
    kind: &str,
    id: &EntityId,
    data: Value,
    expected_version: Option<u64>,
    unique_key: Option<&str>,
) -> Result<Entity, StorageError> {
    let index = entities
        .iter()
        .position(|e| &e.id == id)
        .ok_or_else(|| not_found(kind, id))?;

    if let Some(expected) = expected_version {
        let actual = entities[index].version;
        if actual != expected {
            return Err(StorageError::VersionConflict {
                kind: kind.to_string(),
                id: id.to_string(),
                expected,
                actual,
            });
        }
    }

    if let Some(key) = unique_key {
        ensure_unique(entities, kind, key, unique_value(&data, key)?, Some(id))?;
    }

    let entity = &mut entities[index];
    entity.version += 1;
    entity.data = data;
    Ok(entity.clone())
}

impl StorageGateway for InMemoryGateway {
    fn get_all_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Entity>, StorageError>> {
        Box::pin(async move {
            let kinds = self.kinds.read().await;
            Ok(kinds.get(kind).cloned().unwrap_or_default())
        })
    }

    fn create_entity<'a>(
        &'a self,
        kind: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            ensure_object(&data)?;
            let entity = Entity {
                id: EntityId::generate(),
                version: 1,
                data,
            };
            let mut kinds = self.kinds.write().await;
            kinds.entry(kind.to_string()).or_default().push(entity.clone());
            Ok(entity)
        })
    }

    fn create_unique_entity<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        data: Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            ensure_object(&data)?;
            let value = unique_value(&data, key)?.clone();

            // Hold the write lock across the check and the insert.
            let mut kinds = self.kinds.write().await;
            let entities = kinds.entry(kind.to_string()).or_default();
            ensure_unique(entities, kind, key, &value, None)?;

            let entity = Entity {
                id: EntityId::generate(),
                version: 1,
                data,
            };
            entities.push(entity.clone());
            Ok(entity)
        })
    }

    fn get_entity_by_id<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            let kinds = self.kinds.read().await;
            kinds
                .get(kind)
                .and_then(|entities| entities.iter().find(|e| &e.id == id))
                .cloned()
                .ok_or_else(|| not_found(kind, id))
        })
    }

    fn update_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
        data: Value,
        expected_version: Option<u64>,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            ensure_object(&data)?;
            let mut kinds = self.kinds.write().await;
            let entities = kinds.get_mut(kind).ok_or_else(|| not_found(kind, id))?;
            replace(entities, kind, id, data, expected_version, None)
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
        Box::pin(async move {
            ensure_object(&data)?;
            let mut kinds = self.kinds.write().await;
            let entities = kinds.get_mut(kind).ok_or_else(|| not_found(kind, id))?;
            replace(entities, kind, id, data, expected_version, Some(key))
        })
    }

    fn delete_entity<'a>(
        &'a self,
        kind: &'a str,
        id: &'a EntityId,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut kinds = self.kinds.write().await;
            let entities = kinds.get_mut(kind).ok_or_else(|| not_found(kind, id))?;
            let position = entities
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| not_found(kind, id))?;
            entities.remove(position);
            Ok(())
        })
    }

    fn first_entity_by_filter<'a>(
        &'a self,
        kind: &'a str,
        key: &'a str,
        value: &'a Value,
    ) -> BoxFuture<'a, Result<Entity, StorageError>> {
        Box::pin(async move {
            let kinds = self.kinds.read().await;
            kinds
                .get(kind)
                .and_then(|entities| {
                    entities
                        .iter()
                        .find(|e| field_matches(&e.data, key, value))
                })
                .cloned()
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
            let kinds = self.kinds.read().await;
            let Some(entities) = kinds.get(kind) else {
                // An unknown kind yields no pages at all.
                return Ok(Vec::new());
            };
            let page: Vec<Entity> = entities
                .iter()
                .filter(|e| field_matches(&e.data, key, value))
                .cloned()
                .collect();
            Ok(vec![page])
        })
    }
}
