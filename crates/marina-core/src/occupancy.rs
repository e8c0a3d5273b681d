//! Occupancy allocation: binding boats to slips.
//!
//! Arrivals read a slip, dock the boat and write the slip back conditional on
//! the version that was read. A lost race surfaces as a version conflict; the
//! allocator re-reads and tries again up to
//! [`OccupancyConfig::conflict_retries`] times before reporting
//! [`SlipError::Contention`].
//!
//! The write also carries the one-slip-per-boat rule: the gateway rejects it
//! if the boat is docked in another slip, however the arrivals interleave.
//! The lookup done before the first attempt only turns the common case into
//! an early error.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::OccupancyConfig;
use crate::slip::{
    BoatId, CURRENT_BOAT_FIELD, Slip, SlipError, SlipId, SlipStore, VACANT_SENTINEL,
};

/// Finds vacant slips and docks boats in them.
#[derive(Debug, Clone)]
pub struct OccupancyAllocator {
    store: SlipStore,
    clock: Arc<dyn Clock>,
    config: OccupancyConfig,
}

impl OccupancyAllocator {
    /// Creates an allocator over `store`.
    #[must_use]
    pub fn new(store: SlipStore, clock: Arc<dyn Clock>, config: OccupancyConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Returns the first vacant slip in gateway enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NoVacancy`] if every slip is occupied.
    pub async fn first_available(&self) -> Result<Slip, SlipError> {
        self.store
            .find_first(CURRENT_BOAT_FIELD, &Value::from(VACANT_SENTINEL))
            .await?
            .ok_or(SlipError::NoVacancy)
    }

    /// Returns the slip `boat` is currently docked in.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::BoatNotInSlip`] if the boat is not docked.
    pub async fn find_by_boat(&self, boat: &BoatId) -> Result<Slip, SlipError> {
        self.store
            .find_first(CURRENT_BOAT_FIELD, &Value::from(boat.as_str()))
            .await?
            .ok_or_else(|| SlipError::BoatNotInSlip {
                boat: boat.to_string(),
            })
    }

    /// Docks `boat` in the first vacant slip, stamping today's date.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NoVacancy`] if no slip is free,
    /// [`SlipError::BoatAlreadyDocked`] if the boat is docked elsewhere, or
    /// [`SlipError::Contention`] if every attempt lost a write race.
    pub async fn arrive_at_first_available(&self, boat: &BoatId) -> Result<Slip, SlipError> {
        self.ensure_not_docked(boat).await?;

        let attempts = self.config.conflict_retries + 1;
        for attempt in 1..=attempts {
            let mut slip = self.first_available().await?;
            slip.arrive(boat.clone(), self.clock.today())?;

            match self.store.update_docked(&slip).await {
                Ok(updated) => {
                    info!(slip_id = %updated.id, number = %updated.number, %boat, "boat arrived");
                    return Ok(updated);
                },
                Err(e) if e.is_retryable() => {
                    warn!(slip_id = %slip.id, %boat, attempt, "arrival lost a write race, retrying");
                },
                Err(e) => return Err(e),
            }
        }

        Err(SlipError::Contention {
            operation: "arrive_at_first_available",
            attempts,
        })
    }

    /// Docks `boat` in a specific slip, stamping today's date.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::NotFound`] for an unknown slip,
    /// [`SlipError::OccupiedSlip`] if the slip already hosts a boat (the slip
    /// is left untouched), [`SlipError::BoatAlreadyDocked`] if the boat is
    /// docked elsewhere, or [`SlipError::Contention`].
    pub async fn arrive_at_slip(&self, boat: &BoatId, slip_id: &SlipId) -> Result<Slip, SlipError> {
        let attempts = self.config.conflict_retries + 1;
        for attempt in 1..=attempts {
            let mut slip = self.store.get(slip_id).await?;
            slip.arrive(boat.clone(), self.clock.today())?;
            if attempt == 1 {
                self.ensure_not_docked(boat).await?;
            }

            match self.store.update_docked(&slip).await {
                Ok(updated) => {
                    info!(slip_id = %updated.id, number = %updated.number, %boat, "boat arrived");
                    return Ok(updated);
                },
                Err(e) if e.is_retryable() => {
                    warn!(%slip_id, %boat, attempt, "arrival lost a write race, retrying");
                },
                Err(e) => return Err(e),
            }
        }

        Err(SlipError::Contention {
            operation: "arrive_at_slip",
            attempts,
        })
    }

    async fn ensure_not_docked(&self, boat: &BoatId) -> Result<(), SlipError> {
        match self.find_by_boat(boat).await {
            Ok(slip) => {
                debug!(slip_id = %slip.id, %boat, "boat is already docked");
                Err(SlipError::BoatAlreadyDocked {
                    boat: boat.to_string(),
                    slip_id: slip.id.to_string(),
                })
            },
            Err(SlipError::BoatNotInSlip { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::{DockDate, FixedClock};
    use std::time::Duration;

    use crate::slip::SlipNumber;
    use crate::storage::{
        BoxFuture, Entity, EntityId, InMemoryGateway, StorageError, StorageGateway,
    };

    fn today() -> DockDate {
        DockDate::from_ymd(2024, 3, 7).unwrap()
    }

    fn allocator() -> (SlipStore, OccupancyAllocator) {
        let store = SlipStore::new(Arc::new(InMemoryGateway::new()));
        let allocator = OccupancyAllocator::new(
            store.clone(),
            Arc::new(FixedClock::new(today())),
            OccupancyConfig::default(),
        );
        (store, allocator)
    }

    fn boat(id: &str) -> BoatId {
        BoatId::new(id).unwrap()
    }

    /// Gateway whose writes stall long enough for concurrent readers to
    /// observe the pre-write state.
    struct SlowWrites {
        inner: InMemoryGateway,
        delay: Duration,
    }

    impl StorageGateway for SlowWrites {
        fn get_all_of_kind<'a>(
            &'a self,
            kind: &'a str,
        ) -> BoxFuture<'a, Result<Vec<Entity>, StorageError>> {
            self.inner.get_all_of_kind(kind)
        }

        fn create_entity<'a>(
            &'a self,
            kind: &'a str,
            data: Value,
        ) -> BoxFuture<'a, Result<Entity, StorageError>> {
            self.inner.create_entity(kind, data)
        }

        fn create_unique_entity<'a>(
            &'a self,
            kind: &'a str,
            key: &'a str,
            data: Value,
        ) -> BoxFuture<'a, Result<Entity, StorageError>> {
            self.inner.create_unique_entity(kind, key, data)
        }

        fn get_entity_by_id<'a>(
            &'a self,
            kind: &'a str,
            id: &'a EntityId,
        ) -> BoxFuture<'a, Result<Entity, StorageError>> {
            self.inner.get_entity_by_id(kind, id)
        }

        fn update_entity<'a>(
            &'a self,
            kind: &'a str,
            id: &'a EntityId,
            data: Value,
            expected_version: Option<u64>,
        ) -> BoxFuture<'a, Result<Entity, StorageError>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner
                    .update_entity(kind, id, data, expected_version)
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
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                self.inner
                    .update_unique_entity(kind, id, key, data, expected_version)
                    .await
            })
        }

        fn delete_entity<'a>(
            &'a self,
            kind: &'a str,
            id: &'a EntityId,
        ) -> BoxFuture<'a, Result<(), StorageError>> {
            self.inner.delete_entity(kind, id)
        }

        fn first_entity_by_filter<'a>(
            &'a self,
            kind: &'a str,
            key: &'a str,
            value: &'a Value,
        ) -> BoxFuture<'a, Result<Entity, StorageError>> {
            self.inner.first_entity_by_filter(kind, key, value)
        }

        fn filter_entities<'a>(
            &'a self,
            kind: &'a str,
            key: &'a str,
            value: &'a Value,
        ) -> BoxFuture<'a, Result<Vec<Vec<Entity>>, StorageError>> {
            self.inner.filter_entities(kind, key, value)
        }
    }

    fn slow_allocator() -> (SlipStore, OccupancyAllocator) {
        let gateway = SlowWrites {
            inner: InMemoryGateway::new(),
            delay: Duration::from_millis(20),
        };
        let store = SlipStore::new(Arc::new(gateway));
        let allocator = OccupancyAllocator::new(
            store.clone(),
            Arc::new(FixedClock::new(today())),
            OccupancyConfig::default(),
        );
        (store, allocator)
    }

    #[tokio::test]
    async fn test_first_available_skips_occupied() {
        let (store, allocator) = allocator();
        let first = store.create(SlipNumber(1)).await.unwrap();
        let second = store.create(SlipNumber(2)).await.unwrap();
        allocator.arrive_at_slip(&boat("boat-1"), &first.id).await.unwrap();

        let found = allocator.first_available().await.unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_first_available_with_no_slips() {
        let (_, allocator) = allocator();
        assert!(matches!(
            allocator.first_available().await,
            Err(SlipError::NoVacancy)
        ));
    }

    #[tokio::test]
    async fn test_arrive_at_first_available_stamps_today() {
        let (store, allocator) = allocator();
        store.create(SlipNumber(5)).await.unwrap();

        let slip = allocator
            .arrive_at_first_available(&boat("boat-1"))
            .await
            .unwrap();

        assert_eq!(slip.current_boat(), Some(&boat("boat-1")));
        assert_eq!(slip.arrival_date(), Some(today()));
        assert_eq!(store.get(&slip.id).await.unwrap(), slip);
    }

    #[tokio::test]
    async fn test_arrive_at_first_available_when_full() {
        let (store, allocator) = allocator();
        store.create(SlipNumber(1)).await.unwrap();
        allocator
            .arrive_at_first_available(&boat("boat-1"))
            .await
            .unwrap();

        let result = allocator.arrive_at_first_available(&boat("boat-2")).await;
        assert!(matches!(result, Err(SlipError::NoVacancy)));
    }

    #[tokio::test]
    async fn test_arrive_rejects_boat_already_docked() {
        let (store, allocator) = allocator();
        store.create(SlipNumber(1)).await.unwrap();
        let second = store.create(SlipNumber(2)).await.unwrap();
        allocator
            .arrive_at_first_available(&boat("boat-1"))
            .await
            .unwrap();

        let again = allocator.arrive_at_first_available(&boat("boat-1")).await;
        assert!(matches!(again, Err(SlipError::BoatAlreadyDocked { .. })));

        let explicit = allocator.arrive_at_slip(&boat("boat-1"), &second.id).await;
        assert!(matches!(explicit, Err(SlipError::BoatAlreadyDocked { .. })));
        assert!(store.get(&second.id).await.unwrap().is_vacant());
    }

    #[tokio::test]
    async fn test_arrive_at_occupied_slip_leaves_it_unchanged() {
        let (store, allocator) = allocator();
        let slip = store.create(SlipNumber(1)).await.unwrap();
        let occupied = allocator.arrive_at_slip(&boat("boat-1"), &slip.id).await.unwrap();

        let result = allocator.arrive_at_slip(&boat("boat-2"), &slip.id).await;

        assert!(matches!(result, Err(SlipError::OccupiedSlip { .. })));
        assert_eq!(store.get(&slip.id).await.unwrap(), occupied);
    }

    #[tokio::test]
    async fn test_arrive_at_unknown_slip() {
        let (_, allocator) = allocator();
        let result = allocator
            .arrive_at_slip(&boat("boat-1"), &SlipId::from("missing"))
            .await;
        assert!(matches!(result, Err(SlipError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_find_by_boat() {
        let (store, allocator) = allocator();
        store.create(SlipNumber(1)).await.unwrap();
        let slip = allocator
            .arrive_at_first_available(&boat("boat-1"))
            .await
            .unwrap();

        assert_eq!(allocator.find_by_boat(&boat("boat-1")).await.unwrap().id, slip.id);
        assert!(matches!(
            allocator.find_by_boat(&boat("boat-2")).await,
            Err(SlipError::BoatNotInSlip { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_arrivals_never_double_book() {
        let (store, allocator) = allocator();
        for number in 1..=4 {
            store.create(SlipNumber(number)).await.unwrap();
        }

        let mut handles = Vec::new();
        for n in 0..4 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator
                    .arrive_at_first_available(&boat(&format!("boat-{n}")))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let boats: std::collections::BTreeSet<_> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .filter_map(|slip| slip.current_boat().cloned())
            .collect();
        assert_eq!(boats.len(), 4);
    }

    #[tokio::test]
    async fn test_same_boat_racing_into_two_slips_docks_once() {
        let (store, allocator) = slow_allocator();
        let first = store.create(SlipNumber(1)).await.unwrap();
        let second = store.create(SlipNumber(2)).await.unwrap();

        // Both lookups run before either write lands.
        let boat_a = boat("boat-1");
        let boat_b = boat("boat-1");
        let (a, b) = tokio::join!(
            allocator.arrive_at_slip(&boat_a, &first.id),
            allocator.arrive_at_slip(&boat_b, &second.id),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(SlipError::BoatAlreadyDocked { .. })))
        );
        let docked = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|slip| slip.current_boat() == Some(&boat("boat-1")))
            .count();
        assert_eq!(docked, 1);
    }

    #[tokio::test]
    async fn test_same_boat_racing_for_first_available_docks_once() {
        let (store, allocator) = slow_allocator();
        store.create(SlipNumber(1)).await.unwrap();
        store.create(SlipNumber(2)).await.unwrap();
        let other = allocator.clone();

        let boat_a = boat("boat-1");
        let boat_b = boat("boat-1");
        let (a, b) = tokio::join!(
            allocator.arrive_at_first_available(&boat_a),
            other.arrive_at_first_available(&boat_b),
        );

        assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
        let docked = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .filter(|slip| slip.current_boat() == Some(&boat("boat-1")))
            .count();
        assert_eq!(docked, 1);
    }
}
