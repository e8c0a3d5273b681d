//! marina-core - slip occupancy tracking for marinas.
//!
//! This library tracks which boat occupies which slip, when it arrived, and
//! which boats left each slip before. All persistence goes through a generic
//! document [`storage::StorageGateway`]; the crate itself keeps no state
//! between calls.
//!
//! # Modules
//!
//! - [`storage`]: gateway trait plus in-memory and `SQLite` backends
//! - [`slip`]: slip record, occupancy transitions and CRUD primitives
//! - [`occupancy`]: first-available and explicit-slip arrivals
//! - [`reconcile`]: departures and the boat-removal sweep
//! - [`clock`]: `M/D/YYYY` dates and the clock that stamps them
//! - [`config`]: TOML configuration
//! - [`log`]: `tracing` subscriber setup for binaries
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use marina_core::clock::SystemClock;
//! use marina_core::config::MarinaConfig;
//! use marina_core::slip::{BoatId, SlipNumber};
//! use marina_core::storage::InMemoryGateway;
//! use marina_core::Marina;
//!
//! # async fn example() -> Result<(), marina_core::slip::SlipError> {
//! let marina = Marina::new(
//!     Arc::new(InMemoryGateway::new()),
//!     Arc::new(SystemClock),
//!     &MarinaConfig::default(),
//! );
//! marina.create_slip(SlipNumber(5)).await?;
//!
//! let boat = BoatId::new("boat-1")?;
//! let slip = marina.arrive(&boat, None).await?;
//! assert_eq!(slip.current_boat(), Some(&boat));
//!
//! marina.depart(&boat).await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod log;
mod marina;
pub mod occupancy;
pub mod reconcile;
pub mod slip;
pub mod storage;

pub use marina::Marina;
