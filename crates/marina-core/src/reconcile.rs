//! Departures and boat-removal reconciliation.
//!
//! # Reconciliation Sweep
//!
//! When a boat is permanently removed from the registry every slip that
//! still references it is scrubbed:
//!
//! ```text
//! scan all slip records
//!     |
//!     +-- record does not decode --> failed
//!     |
//!     +-- slip untouched by boat --> skipped
//!     |
//!     +-- slip references boat --> task (bounded by max_concurrency)
//!                                     |
//!                         forget_boat + conditional update
//!                                     |
//!                      conflict? re-read and reapply (idempotent)
//!                                     |
//!                                     v
//!                       ReconciliationReport { updated, failed }
//! ```
//!
//! Every task is awaited, so completion is observable and per-slip failures
//! are reported instead of being dropped. The sweep is not atomic across
//! slips: a failure leaves the remaining slips reconciled and the failed ones
//! listed in the report, and re-running the sweep finishes the job.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{OccupancyConfig, ReconciliationConfig};
use crate::occupancy::OccupancyAllocator;
use crate::slip::{BoatId, Slip, SlipError, SlipId, SlipStore};

/// A slip the sweep could not reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationFailure {
    /// The slip that was left unreconciled.
    pub slip_id: SlipId,
    /// Rendered error.
    pub error: String,
}

/// Outcome of a boat-removal sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// The removed boat.
    pub boat: BoatId,
    /// Number of slips inspected.
    pub scanned: usize,
    /// Slips that were rewritten.
    pub updated: Vec<SlipId>,
    /// Slips that could not be rewritten.
    pub failed: Vec<ReconciliationFailure>,
}

impl ReconciliationReport {
    /// Returns `true` if every affected slip was reconciled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Detaches boats from slips and scrubs removed boats from slip records.
#[derive(Debug, Clone)]
pub struct DepartureEngine {
    store: SlipStore,
    allocator: OccupancyAllocator,
    clock: Arc<dyn Clock>,
    occupancy: OccupancyConfig,
    reconciliation: ReconciliationConfig,
}

impl DepartureEngine {
    /// Creates an engine over `store`.
    #[must_use]
    pub fn new(
        store: SlipStore,
        clock: Arc<dyn Clock>,
        occupancy: OccupancyConfig,
        reconciliation: ReconciliationConfig,
    ) -> Self {
        let allocator = OccupancyAllocator::new(store.clone(), Arc::clone(&clock), occupancy);
        Self {
            store,
            allocator,
            clock,
            occupancy,
            reconciliation,
        }
    }

    /// Vacates the slip `boat` is docked in and records the departure.
    ///
    /// # Errors
    ///
    /// Returns [`SlipError::BoatNotInSlip`] if the boat is not docked, or
    /// [`SlipError::Contention`] if every attempt lost a write race.
    pub async fn depart_boat(&self, boat: &BoatId) -> Result<Slip, SlipError> {
        let attempts = self.occupancy.conflict_retries + 1;
        for attempt in 1..=attempts {
            let mut slip = self.allocator.find_by_boat(boat).await?;
            slip.depart(self.clock.today());

            match self.store.update(&slip).await {
                Ok(updated) => {
                    info!(slip_id = %updated.id, number = %updated.number, %boat, "boat departed");
                    return Ok(updated);
                },
                Err(e) if e.is_retryable() => {
                    warn!(slip_id = %slip.id, %boat, attempt, "departure lost a write race, retrying");
                },
                Err(e) => return Err(e),
            }
        }

        Err(SlipError::Contention {
            operation: "depart_boat",
            attempts,
        })
    }

    /// Scrubs every slip that references a boat removed from the registry.
    ///
    /// A slip hosting the boat is vacated with an anonymized departure, and
    /// every history entry naming the boat is anonymized. Each affected slip
    /// is written once with its final state.
    ///
    /// # Errors
    ///
    /// Returns an error only if the slips cannot be listed. Per-slip failures,
    /// including records that cannot be decoded, are collected in the report.
    pub async fn delete_boat(&self, boat: &BoatId) -> Result<ReconciliationReport, SlipError> {
        let records = self.store.scan().await?;
        let mut report = ReconciliationReport {
            boat: boat.clone(),
            scanned: records.len(),
            updated: Vec::new(),
            failed: Vec::new(),
        };
        let permits = Arc::new(Semaphore::new(self.reconciliation.max_concurrency.max(1)));

        let mut handles = Vec::new();
        for (slip_id, record) in records {
            let slip = match record {
                Ok(slip) if slip.references(boat) => slip,
                Ok(_) => continue,
                Err(e) => {
                    let error = e.to_string();
                    warn!(%slip_id, %boat, %error, "skipping undecodable slip");
                    report.failed.push(ReconciliationFailure { slip_id, error });
                    continue;
                },
            };
            let task = ScrubTask {
                store: self.store.clone(),
                clock: Arc::clone(&self.clock),
                boat: boat.clone(),
                attempts: self.occupancy.conflict_retries + 1,
            };
            let permits = Arc::clone(&permits);
            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| e.to_string())?;
                task.run(slip).await.map_err(|e| e.to_string())
            });
            handles.push((slip_id, handle));
        }

        for (slip_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(join_error.to_string()),
            };
            match outcome {
                Ok(true) => report.updated.push(slip_id),
                Ok(false) => debug!(%slip_id, %boat, "slip no longer references boat"),
                Err(error) => {
                    warn!(%slip_id, %boat, %error, "failed to reconcile slip");
                    report.failed.push(ReconciliationFailure { slip_id, error });
                },
            }
        }

        info!(
            %boat,
            scanned = report.scanned,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "boat removal reconciled"
        );
        Ok(report)
    }
}

/// Idempotent scrub of one slip.
struct ScrubTask {
    store: SlipStore,
    clock: Arc<dyn Clock>,
    boat: BoatId,
    attempts: u32,
}

impl ScrubTask {
    /// Returns `true` if the slip was rewritten, `false` if there was nothing
    /// left to scrub.
    async fn run(self, mut slip: Slip) -> Result<bool, SlipError> {
        for attempt in 1..=self.attempts {
            if !slip.forget_boat(&self.boat, self.clock.today()) {
                return Ok(false);
            }

            match self.store.update(&slip).await {
                Ok(_) => return Ok(true),
                Err(SlipError::NotFound { .. }) => return Ok(false),
                Err(e) if e.is_retryable() => {
                    debug!(slip_id = %slip.id, boat = %self.boat, attempt, "scrub conflicted, re-reading");
                    slip = match self.store.get(&slip.id).await {
                        Ok(fresh) => fresh,
                        Err(SlipError::NotFound { .. }) => return Ok(false),
                        Err(e) => return Err(e),
                    };
                },
                Err(e) => return Err(e),
            }
        }

        Err(SlipError::Contention {
            operation: "delete_boat",
            attempts: self.attempts,
        })
    }
}
