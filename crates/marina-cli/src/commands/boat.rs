//! Boat movement commands.

use anyhow::{Context, Result, bail};
use marina_core::Marina;
use marina_core::slip::{BoatId, SlipId, SlipRecord};
use tracing::warn;

use super::print_json;

fn parse_boat(boat: &str) -> Result<BoatId> {
    BoatId::new(boat).with_context(|| format!("invalid boat id {boat:?}"))
}

/// Dock `boat`, in `slip` if given, else in the first vacant slip.
pub async fn arrive(marina: &Marina, boat: &str, slip: Option<&str>) -> Result<()> {
    let boat = parse_boat(boat)?;
    let slip_id = slip.map(SlipId::from);
    let slip = marina
        .arrive(&boat, slip_id.as_ref())
        .await
        .with_context(|| format!("arrival of {boat} failed"))?;
    print_json(&SlipRecord::from(&slip))
}

/// Record `boat` leaving its slip.
pub async fn depart(marina: &Marina, boat: &str) -> Result<()> {
    let boat = parse_boat(boat)?;
    let slip = marina
        .depart(&boat)
        .await
        .with_context(|| format!("departure of {boat} failed"))?;
    print_json(&SlipRecord::from(&slip))
}

/// Scrub every reference to `boat`.
///
/// Prints the report even when some slips could not be updated, then exits
/// with an error so the sweep can be re-run.
pub async fn remove(marina: &Marina, boat: &str) -> Result<()> {
    let boat = parse_boat(boat)?;
    let report = marina
        .remove_boat(&boat)
        .await
        .with_context(|| format!("removal of {boat} failed"))?;
    print_json(&report)?;

    if !report.is_complete() {
        warn!(%boat, failed = report.failed.len(), "boat removal left slips unreconciled");
        bail!(
            "{} slip(s) still reference {boat}; re-run remove-boat",
            report.failed.len()
        );
    }
    Ok(())
}
