//! Slip occupancy state and transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SlipError;
use crate::clock::DockDate;
use crate::storage::EntityId;

/// Value stored in `current_boat` and `arrival_date` while a slip is vacant.
pub const VACANT_SENTINEL: &str = "";

/// Value stored in `departed_boat` once the boat's identity is forgotten.
pub const ANONYMIZED_SENTINEL: &str = "undefined";

/// Gateway-assigned identifier of a slip.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlipId(EntityId);

impl SlipId {
    /// Returns the underlying entity id.
    #[must_use]
    pub const fn entity_id(&self) -> &EntityId {
        &self.0
    }
}

impl From<EntityId> for SlipId {
    fn from(id: EntityId) -> Self {
        Self(id)
    }
}

impl From<&str> for SlipId {
    fn from(id: &str) -> Self {
        Self(EntityId::from(id))
    }
}

impl fmt::Display for SlipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Human-readable slip number painted on the dock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlipNumber(pub u32);

impl fmt::Display for SlipNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of a boat, owned by the boat registry.
///
/// The persisted sentinels [`VACANT_SENTINEL`] and [`ANONYMIZED_SENTINEL`]
/// are not valid boat ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BoatId(String);

impl BoatId {
    /// Validates and wraps a boat id.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::InvalidBoatId`] if `value` is empty or collides
    /// with a persisted sentinel.
    pub fn new(value: impl Into<String>) -> Result<Self, SlipError> {
        let value = value.into();
        if value == VACANT_SENTINEL {
            return Err(SlipError::InvalidBoatId {
                value,
                reason: "boat id must not be empty",
            });
        }
        if value == ANONYMIZED_SENTINEL {
            return Err(SlipError::InvalidBoatId {
                value,
                reason: "boat id is reserved for anonymized departures",
            });
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for BoatId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for BoatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a slip currently hosts a boat.
///
/// The arrival date only exists while a boat is docked, so a boat without a
/// date (or a date without a boat) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupancy {
    /// No boat is docked.
    Vacant,
    /// A boat is docked.
    Occupied {
        /// The docked boat.
        boat: BoatId,
        /// Day the boat arrived.
        arrival_date: DockDate,
    },
}

/// Identity of the boat recorded on a departure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartedBoat {
    /// The boat is still known to the registry.
    Known(BoatId),
    /// The boat was removed from the registry and its identity forgotten.
    Anonymized,
}

impl DepartedBoat {
    /// Returns `true` if this entry names `boat`.
    #[must_use]
    pub fn is(&self, boat: &BoatId) -> bool {
        matches!(self, Self::Known(known) if known == boat)
    }
}

/// One entry in a slip's departure history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartureRecord {
    /// Day the boat left.
    pub departure_date: DockDate,
    /// Which boat left.
    pub departed_boat: DepartedBoat,
}

/// A marina slip and its occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slip {
    /// Gateway-assigned id.
    pub id: SlipId,

    /// Stored version this value was read at. Updates are conditional on it.
    pub version: u64,

    /// Human-readable slip number.
    pub number: SlipNumber,

    /// Current occupant, if any.
    pub occupancy: Occupancy,

    /// Past departures, newest first.
    pub departure_history: Vec<DepartureRecord>,
}

impl Slip {
    /// Returns `true` if no boat is docked.
    #[must_use]
    pub const fn is_vacant(&self) -> bool {
        matches!(self.occupancy, Occupancy::Vacant)
    }

    /// Returns the docked boat, if any.
    #[must_use]
    pub const fn current_boat(&self) -> Option<&BoatId> {
        match &self.occupancy {
            Occupancy::Vacant => None,
            Occupancy::Occupied { boat, .. } => Some(boat),
        }
    }

    /// Returns the arrival date of the docked boat, if any.
    #[must_use]
    pub const fn arrival_date(&self) -> Option<DockDate> {
        match &self.occupancy {
            Occupancy::Vacant => None,
            Occupancy::Occupied { arrival_date, .. } => Some(*arrival_date),
        }
    }

    /// Returns `true` if the slip hosts `boat` or remembers it in its
    /// departure history.
    #[must_use]
    pub fn references(&self, boat: &BoatId) -> bool {
        self.current_boat() == Some(boat)
            || self
                .departure_history
                .iter()
                .any(|record| record.departed_boat.is(boat))
    }

    /// Docks `boat` in this slip.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::OccupiedSlip`] and leaves the slip untouched if a
    /// boat is already docked.
    pub fn arrive(&mut self, boat: BoatId, date: DockDate) -> Result<(), SlipError> {
        if let Some(current) = self.current_boat() {
            return Err(SlipError::OccupiedSlip {
                slip_id: self.id.to_string(),
                current_boat: current.to_string(),
            });
        }
        self.occupancy = Occupancy::Occupied {
            boat,
            arrival_date: date,
        };
        Ok(())
    }

    /// Vacates the slip, prepending a departure for the boat that left.
    ///
    /// Returns the departed boat, or `None` if the slip was already vacant.
    pub fn depart(&mut self, date: DockDate) -> Option<BoatId> {
        let Occupancy::Occupied { boat, .. } =
            std::mem::replace(&mut self.occupancy, Occupancy::Vacant)
        else {
            return None;
        };
        self.record_departure(date, DepartedBoat::Known(boat.clone()));
        Some(boat)
    }

    /// Scrubs every reference to a boat that was removed from the registry.
    ///
    /// If the boat is docked here the slip is vacated with an anonymized
    /// departure; any history entry naming the boat is anonymized in place.
    /// Returns `true` if anything changed.
    pub fn forget_boat(&mut self, boat: &BoatId, date: DockDate) -> bool {
        let mut changed = false;

        for record in &mut self.departure_history {
            if record.departed_boat.is(boat) {
                record.departed_boat = DepartedBoat::Anonymized;
                changed = true;
            }
        }

        if self.current_boat() == Some(boat) {
            self.occupancy = Occupancy::Vacant;
            self.record_departure(date, DepartedBoat::Anonymized);
            changed = true;
        }

        changed
    }

    fn record_departure(&mut self, departure_date: DockDate, departed_boat: DepartedBoat) {
        self.departure_history.insert(
            0,
            DepartureRecord {
                departure_date,
                departed_boat,
            },
        );
    }
}
