//! Slip entity model.
//!
//! A slip is a mooring location that hosts at most one boat at a time and
//! remembers the boats that left it.
//!
//! # State Machine
//!
//! ```text
//! Vacant --arrive(boat)--> Occupied(boat)
//!                              |
//!          depart() / forget_boat(boat)
//!                              |
//!                              v
//!                           Vacant   (+1 departure record, prepended)
//! ```
//!
//! Anonymizing history entries during reconciliation never changes the
//! occupancy state.
//!
//! # Key Concepts
//!
//! - **Occupancy**: `Vacant` or `Occupied { boat, arrival_date }`; a boat
//!   without an arrival date cannot be represented
//! - **Departure history**: newest first, only ever grown by prepending
//! - **Anonymized departure**: a history entry whose boat was removed from
//!   the registry
//! - **Version**: every stored slip carries the version it was read at;
//!   updates are conditional on it
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use marina_core::slip::{SlipNumber, SlipStore};
//! use marina_core::storage::InMemoryGateway;
//!
//! # async fn example() -> Result<(), marina_core::slip::SlipError> {
//! let store = SlipStore::new(Arc::new(InMemoryGateway::new()));
//! let slip = store.create_unique(SlipNumber(5)).await?;
//! assert!(slip.is_vacant());
//! assert!(!store.is_unique(SlipNumber(5)).await?);
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod state;
mod store;

#[cfg(test)]
mod proptest_occupancy;

pub use document::{
    CURRENT_BOAT_FIELD, DepartureDocument, NUMBER_FIELD, SlipDocument, SlipRecord,
};
pub use error::SlipError;
pub use state::{
    ANONYMIZED_SENTINEL, BoatId, DepartedBoat, DepartureRecord, Occupancy, Slip, SlipId,
    SlipNumber, VACANT_SENTINEL,
};
pub use store::{SLIP_KIND, SlipStore};
