//! Slip management commands.

use anyhow::{Context, Result};
use marina_core::Marina;
use marina_core::slip::{SlipId, SlipNumber, SlipRecord};
use serde_json::json;

use super::print_json;

/// List every slip.
pub async fn list(marina: &Marina) -> Result<()> {
    let slips = marina.list_slips().await.context("failed to list slips")?;
    let records: Vec<SlipRecord> = slips.iter().map(SlipRecord::from).collect();
    print_json(&records)
}

/// Create a vacant slip numbered `number`.
pub async fn create(marina: &Marina, number: u32) -> Result<()> {
    let slip = marina
        .create_slip(SlipNumber(number))
        .await
        .with_context(|| format!("failed to create slip {number}"))?;
    print_json(&SlipRecord::from(&slip))
}

/// Show one slip.
pub async fn show(marina: &Marina, id: &str) -> Result<()> {
    let slip = marina
        .get_slip(&SlipId::from(id))
        .await
        .with_context(|| format!("failed to read slip {id}"))?;
    print_json(&SlipRecord::from(&slip))
}

/// Delete one slip.
pub async fn delete(marina: &Marina, id: &str) -> Result<()> {
    marina
        .delete_slip(&SlipId::from(id))
        .await
        .with_context(|| format!("failed to delete slip {id}"))?;
    print_json(&json!({ "deleted": id }))
}
