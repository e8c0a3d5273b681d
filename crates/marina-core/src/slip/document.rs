//! Persisted slip document shape.
//!
//! Stored slips keep the flat string layout used by the marina API:
//!
//! ```json
//! {
//!   "number": 5,
//!   "current_boat": "abc555",
//!   "arrival_date": "1/1/2015",
//!   "departure_history": [{"departure_date": "11/4/2014", "departed_boat": "123aaa"}]
//! }
//! ```
//!
//! A vacant slip stores empty strings for `current_boat` and `arrival_date`;
//! a forgotten boat is stored as `"undefined"`. Decoding maps these sentinels
//! onto [`Occupancy`] and [`DepartedBoat`] and rejects records where only one
//! of the two occupancy fields is empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SlipError;
use super::state::{
    ANONYMIZED_SENTINEL, BoatId, DepartedBoat, DepartureRecord, Occupancy, Slip, SlipId,
    SlipNumber, VACANT_SENTINEL,
};
use crate::clock::DockDate;
use crate::storage::Entity;

/// Field the uniqueness constraint is keyed on.
pub const NUMBER_FIELD: &str = "number";

/// Field holding the docked boat.
pub const CURRENT_BOAT_FIELD: &str = "current_boat";

/// Stored form of a slip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlipDocument {
    /// Slip number.
    pub number: u32,
    /// Docked boat, or `""`.
    #[serde(default)]
    pub current_boat: String,
    /// Arrival date `M/D/YYYY`, or `""`.
    #[serde(default)]
    pub arrival_date: String,
    /// Departures, newest first.
    #[serde(default)]
    pub departure_history: Vec<DepartureDocument>,
}

/// Stored form of a departure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureDocument {
    /// Departure date `M/D/YYYY`.
    pub departure_date: String,
    /// Departed boat, or `"undefined"`.
    pub departed_boat: String,
}

/// A slip document together with its id, as returned to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlipRecord {
    /// Slip id.
    pub id: SlipId,
    /// The stored fields.
    #[serde(flatten)]
    pub document: SlipDocument,
}

impl SlipDocument {
    /// Document for a freshly created, vacant slip.
    #[must_use]
    pub const fn vacant(number: SlipNumber) -> Self {
        Self {
            number: number.0,
            current_boat: String::new(),
            arrival_date: String::new(),
            departure_history: Vec::new(),
        }
    }

    /// Encodes the document as a gateway value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<Value, SlipError> {
        serde_json::to_value(self).map_err(|e| SlipError::Storage(e.into()))
    }
}

impl From<&Slip> for SlipDocument {
    fn from(slip: &Slip) -> Self {
        let (current_boat, arrival_date) = match &slip.occupancy {
            Occupancy::Vacant => (VACANT_SENTINEL.to_string(), VACANT_SENTINEL.to_string()),
            Occupancy::Occupied { boat, arrival_date } => {
                (boat.to_string(), arrival_date.to_string())
            },
        };

        Self {
            number: slip.number.0,
            current_boat,
            arrival_date,
            departure_history: slip
                .departure_history
                .iter()
                .map(|record| DepartureDocument {
                    departure_date: record.departure_date.to_string(),
                    departed_boat: match &record.departed_boat {
                        DepartedBoat::Known(boat) => boat.to_string(),
                        DepartedBoat::Anonymized => ANONYMIZED_SENTINEL.to_string(),
                    },
                })
                .collect(),
        }
    }
}

impl From<&Slip> for SlipRecord {
    fn from(slip: &Slip) -> Self {
        Self {
            id: slip.id.clone(),
            document: SlipDocument::from(slip),
        }
    }
}

impl TryFrom<Entity> for Slip {
    type Error = SlipError;

    fn try_from(entity: Entity) -> Result<Self, Self::Error> {
        let slip_id = entity.id.to_string();
        let corrupt = |reason: String| SlipError::CorruptRecord {
            slip_id: slip_id.clone(),
            reason,
        };

        let document: SlipDocument =
            serde_json::from_value(entity.data).map_err(|e| corrupt(e.to_string()))?;

        let occupancy = match (
            document.current_boat.as_str(),
            document.arrival_date.as_str(),
        ) {
            (VACANT_SENTINEL, VACANT_SENTINEL) => Occupancy::Vacant,
            (VACANT_SENTINEL, _) => {
                return Err(corrupt("arrival_date set on a vacant slip".to_string()));
            },
            (_, VACANT_SENTINEL) => {
                return Err(corrupt("occupied slip has no arrival_date".to_string()));
            },
            (boat, date) => Occupancy::Occupied {
                boat: BoatId::new(boat).map_err(|e| corrupt(e.to_string()))?,
                arrival_date: parse_date(date).map_err(corrupt)?,
            },
        };

        let departure_history = document
            .departure_history
            .into_iter()
            .map(|entry| {
                let departed_boat = if entry.departed_boat == ANONYMIZED_SENTINEL {
                    DepartedBoat::Anonymized
                } else {
                    DepartedBoat::Known(
                        BoatId::new(entry.departed_boat).map_err(|e| corrupt(e.to_string()))?,
                    )
                };
                Ok(DepartureRecord {
                    departure_date: parse_date(&entry.departure_date).map_err(corrupt)?,
                    departed_boat,
                })
            })
            .collect::<Result<Vec<_>, SlipError>>()?;

        Ok(Self {
            id: SlipId::from(entity.id),
            version: entity.version,
            number: SlipNumber(document.number),
            occupancy,
            departure_history,
        })
    }
}

fn parse_date(raw: &str) -> Result<DockDate, String> {
    raw.parse::<DockDate>().map_err(|e| e.to_string())
}
