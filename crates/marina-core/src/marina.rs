//! Entry point wiring the slip store and both engines to one gateway.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, MarinaConfig};
use crate::occupancy::OccupancyAllocator;
use crate::reconcile::{DepartureEngine, ReconciliationReport};
use crate::slip::{BoatId, Slip, SlipError, SlipId, SlipNumber, SlipStore};
use crate::storage::StorageGateway;

/// Slip occupancy operations over a single storage gateway.
///
/// This is the surface an outer API layer calls; it holds no state of its
/// own beyond the shared gateway and clock.
#[derive(Debug, Clone)]
pub struct Marina {
    store: SlipStore,
    allocator: OccupancyAllocator,
    departures: DepartureEngine,
}

impl Marina {
    /// Wires the engines to `gateway` using the settings in `config`.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        clock: Arc<dyn Clock>,
        config: &MarinaConfig,
    ) -> Self {
        let store = SlipStore::new(gateway);
        let allocator =
            OccupancyAllocator::new(store.clone(), Arc::clone(&clock), config.occupancy);
        let departures = DepartureEngine::new(
            store.clone(),
            clock,
            config.occupancy,
            config.reconciliation,
        );
        Self {
            store,
            allocator,
            departures,
        }
    }

    /// Opens the configured gateway and stamps dates with the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend cannot be opened.
    pub fn from_config(config: &MarinaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let gateway = config.storage.open_gateway()?;
        Ok(Self::new(gateway, Arc::new(SystemClock), config))
    }

    /// Direct access to slip CRUD.
    #[must_use]
    pub const fn slips(&self) -> &SlipStore {
        &self.store
    }

    /// See [`SlipStore::list_all`].
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_slips(&self) -> Result<Vec<Slip>, SlipError> {
        self.store.list_all().await
    }

    /// See [`SlipStore::create_unique`].
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::DuplicateNumber`] if the number is taken.
    pub async fn create_slip(&self, number: SlipNumber) -> Result<Slip, SlipError> {
        self.store.create_unique(number).await
    }

    /// See [`SlipStore::get`].
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NotFound`] for an unknown slip.
    pub async fn get_slip(&self, id: &SlipId) -> Result<Slip, SlipError> {
        self.store.get(id).await
    }

    /// See [`SlipStore::delete`].
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NotFound`] for an unknown slip.
    pub async fn delete_slip(&self, id: &SlipId) -> Result<(), SlipError> {
        self.store.delete(id).await
    }

    /// Docks `boat` in `slip_id`, or in the first vacant slip when `None`.
    ///
    /// # Errors
    ///
    /// See [`OccupancyAllocator::arrive_at_slip`] and
    /// [`OccupancyAllocator::arrive_at_first_available`].
    pub async fn arrive(&self, boat: &BoatId, slip_id: Option<&SlipId>) -> Result<Slip, SlipError> {
        match slip_id {
            Some(slip_id) => self.allocator.arrive_at_slip(boat, slip_id).await,
            None => self.allocator.arrive_at_first_available(boat).await,
        }
    }

    /// Returns the slip `boat` is docked in.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::BoatNotInSlip`] if the boat is not docked.
    pub async fn find_boat(&self, boat: &BoatId) -> Result<Slip, SlipError> {
        self.allocator.find_by_boat(boat).await
    }

    /// See [`DepartureEngine::depart_boat`].
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::BoatNotInSlip`] if the boat is not docked.
    pub async fn depart(&self, boat: &BoatId) -> Result<Slip, SlipError> {
        self.departures.depart_boat(boat).await
    }

    /// See [`DepartureEngine::delete_boat`].
    ///
    /// # Errors
    ///
    /// Returns an error if the slips cannot be listed.
    pub async fn remove_boat(&self, boat: &BoatId) -> Result<ReconciliationReport, SlipError> {
        self.departures.delete_boat(boat).await
    }
}
