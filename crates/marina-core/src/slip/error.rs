//! Slip module error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur during slip occupancy operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SlipError {
    /// The requested slip does not exist.
    #[error("slip not found: {slip_id}")]
    NotFound {
        /// The slip ID that was not found.
        slip_id: String,
    },

    /// Arrival was requested for a slip that already hosts a boat.
    #[error("slip {slip_id} is occupied by boat {current_boat}")]
    OccupiedSlip {
        /// The occupied slip.
        slip_id: String,
        /// The boat currently docked there.
        current_boat: String,
    },

    /// First-available allocation found no vacant slip.
    #[error("no vacant slip available")]
    NoVacancy,

    /// Departure was requested for a boat that is not docked anywhere.
    #[error("boat {boat} is not docked in any slip")]
    BoatNotInSlip {
        /// The boat that was expected to be docked.
        boat: String,
    },

    /// Arrival was requested for a boat that is already docked.
    #[error("boat {boat} is already docked in slip {slip_id}")]
    BoatAlreadyDocked {
        /// The boat.
        boat: String,
        /// The slip it currently occupies.
        slip_id: String,
    },

    /// Another slip already carries this number.
    #[error("slip number {number} is already in use")]
    DuplicateNumber {
        /// The colliding slip number.
        number: u32,
    },

    /// The boat identifier cannot be stored on a slip record.
    #[error("invalid boat id '{value}': {reason}")]
    InvalidBoatId {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A stored slip document violates the record invariants.
    #[error("corrupt slip record {slip_id}: {reason}")]
    CorruptRecord {
        /// The slip ID of the corrupt record.
        slip_id: String,
        /// Description of the violation.
        reason: String,
    },

    /// Concurrent writers kept winning the race for the same slip.
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    Contention {
        /// The operation that was retried.
        operation: &'static str,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The storage gateway failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SlipError {
    /// Returns `true` if re-reading the slip and retrying may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_conflict())
    }
}
