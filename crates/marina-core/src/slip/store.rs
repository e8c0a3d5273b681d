//! CRUD primitives for the `slip` kind.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::document::{CURRENT_BOAT_FIELD, NUMBER_FIELD, SlipDocument};
use super::error::SlipError;
use super::state::{Slip, SlipId, SlipNumber};
use crate::storage::{StorageError, StorageGateway};

/// Entity kind under which slips are stored.
pub const SLIP_KIND: &str = "slip";

/// Typed access to slip records through a [`StorageGateway`].
///
/// Every update is a full overwrite of the tracked fields and is conditional
/// on the version the slip was read at, so callers always read, modify and
/// write the complete record.
#[derive(Clone)]
pub struct SlipStore {
    gateway: Arc<dyn StorageGateway>,
}

impl std::fmt::Debug for SlipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlipStore").finish_non_exhaustive()
    }
}

fn map_not_found(id: &SlipId) -> impl FnOnce(StorageError) -> SlipError + '_ {
    move |e| match e {
        StorageError::NotFound { .. } => SlipError::NotFound {
            slip_id: id.to_string(),
        },
        other => SlipError::Storage(other),
    }
}

impl SlipStore {
    /// Creates a store over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Returns every slip, in gateway enumeration order.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures and rejects corrupt records.
    pub async fn list_all(&self) -> Result<Vec<Slip>, SlipError> {
        let entities = self.gateway.get_all_of_kind(SLIP_KIND).await?;
        entities.into_iter().map(Slip::try_from).collect()
    }

    /// Returns every slip record, decoding each one independently.
    ///
    /// Unlike [`list_all`](Self::list_all), a corrupt record does not hide
    /// the others; it is returned alongside its id as an error.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn scan(&self) -> Result<Vec<(SlipId, Result<Slip, SlipError>)>, SlipError> {
        let entities = self.gateway.get_all_of_kind(SLIP_KIND).await?;
        Ok(entities
            .into_iter()
            .map(|entity| (SlipId::from(entity.id.clone()), Slip::try_from(entity)))
            .collect())
    }

    /// Creates a vacant slip without checking number uniqueness.
    ///
    /// Prefer [`create_unique`](Self::create_unique) unless the caller has
    /// its own uniqueness guarantee.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn create(&self, number: SlipNumber) -> Result<Slip, SlipError> {
        let data = SlipDocument::vacant(number).to_value()?;
        let entity = self.gateway.create_entity(SLIP_KIND, data).await?;
        debug!(slip_id = %entity.id, %number, "slip created");
        Slip::try_from(entity)
    }

    /// Creates a vacant slip, failing if another slip already has `number`.
    ///
    /// The check and the insert are a single gateway operation, so two
    /// concurrent creations of the same number cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::DuplicateNumber`] on collision.
    pub async fn create_unique(&self, number: SlipNumber) -> Result<Slip, SlipError> {
        let data = SlipDocument::vacant(number).to_value()?;
        let entity = self
            .gateway
            .create_unique_entity(SLIP_KIND, NUMBER_FIELD, data)
            .await
            .map_err(|e| match e {
                StorageError::UniqueViolation { .. } => {
                    SlipError::DuplicateNumber { number: number.0 }
                },
                other => SlipError::Storage(other),
            })?;
        debug!(slip_id = %entity.id, %number, "slip created");
        Slip::try_from(entity)
    }

    /// Loads a slip by id.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NotFound`] if no such slip exists.
    pub async fn get(&self, id: &SlipId) -> Result<Slip, SlipError> {
        let entity = self
            .gateway
            .get_entity_by_id(SLIP_KIND, id.entity_id())
            .await
            .map_err(map_not_found(id))?;
        Slip::try_from(entity)
    }

    /// Persists every tracked field of `slip`.
    ///
    /// The write is conditional on `slip.version`; the returned slip carries
    /// the new version.
    ///
    /// # Errors
    ///
    /// Returns a retryable storage conflict if the slip changed since it was
    /// read, or [`SlipError::NotFound`] if it was deleted.
    pub async fn update(&self, slip: &Slip) -> Result<Slip, SlipError> {
        let data = SlipDocument::from(slip).to_value()?;
        let entity = self
            .gateway
            .update_entity(SLIP_KIND, slip.id.entity_id(), data, Some(slip.version))
            .await
            .map_err(map_not_found(&slip.id))?;
        Slip::try_from(entity)
    }

    /// Persists `slip` like [`update`](Self::update), additionally refusing
    /// the write if its boat is docked in any other slip.
    ///
    /// The boat check is evaluated by the gateway together with the version
    /// check, so two concurrent arrivals of the same boat cannot both land.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::BoatAlreadyDocked`] if another slip holds the
    /// boat, plus everything [`update`](Self::update) returns.
    pub async fn update_docked(&self, slip: &Slip) -> Result<Slip, SlipError> {
        let Some(boat) = slip.current_boat() else {
            return self.update(slip).await;
        };
        let data = SlipDocument::from(slip).to_value()?;
        let entity = self
            .gateway
            .update_unique_entity(
                SLIP_KIND,
                slip.id.entity_id(),
                CURRENT_BOAT_FIELD,
                data,
                Some(slip.version),
            )
            .await
            .map_err(|e| match e {
                StorageError::UniqueViolation { existing_id, .. } => {
                    SlipError::BoatAlreadyDocked {
                        boat: boat.to_string(),
                        slip_id: existing_id,
                    }
                },
                other => map_not_found(&slip.id)(other),
            })?;
        Slip::try_from(entity)
    }

    /// Removes a slip. Boats are not affected.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NotFound`] if no such slip exists.
    pub async fn delete(&self, id: &SlipId) -> Result<(), SlipError> {
        self.gateway
            .delete_entity(SLIP_KIND, id.entity_id())
            .await
            .map_err(map_not_found(id))?;
        debug!(slip_id = %id, "slip deleted");
        Ok(())
    }

    /// Returns `true` if no existing slip carries `number`.
    ///
    /// This is an advisory check; [`create_unique`](Self::create_unique) is
    /// the authoritative one.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures.
    pub async fn is_unique(&self, number: SlipNumber) -> Result<bool, SlipError> {
        let pages = self
            .gateway
            .filter_entities(SLIP_KIND, NUMBER_FIELD, &Value::from(number.0))
            .await?;
        Ok(pages.first().is_none_or(Vec::is_empty))
    }

    /// Returns the first slip whose `field` equals `value`.
    pub(crate) async fn find_first(
        &self,
        field: &str,
        value: &Value,
    ) -> Result<Option<Slip>, SlipError> {
        match self
            .gateway
            .first_entity_by_filter(SLIP_KIND, field, value)
            .await
        {
            Ok(entity) => Slip::try_from(entity).map(Some),
            Err(StorageError::NoneMatched { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
