//! CLI command implementations.

pub mod boat;
pub mod slip;

use anyhow::{Context, Result};
use serde::Serialize;

/// Writes `value` to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
