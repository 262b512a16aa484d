//! Persistence layer.
//!
//! Saves and loads the paper-trading ledger (balance, open positions,
//! watchlist) to/from a JSON file. The file is written after every
//! successful ledger mutation; a missing file on startup means a fresh
//! ledger.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::ledger::Ledger;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "predicthub_state.json";

/// Save the ledger to a JSON file.
pub fn save_ledger(ledger: &Ledger, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(ledger)
        .context("Failed to serialise ledger")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write ledger to {path}"))?;

    debug!(path, balance = %ledger.balance(), "Ledger saved");
    Ok(())
}

/// Load the ledger from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_ledger(path: Option<&str>) -> Result<Option<Ledger>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved ledger found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read ledger from {path}"))?;

    let ledger: Ledger = serde_json::from_str(&json)
        .context(format!("Failed to parse ledger from {path}"))?;

    info!(
        path,
        balance = %ledger.balance(),
        positions = ledger.positions().len(),
        watched = ledger.watchlist().len(),
        "Ledger loaded from disk"
    );

    Ok(Some(ledger))
}

/// Delete the state file (for testing or reset).
pub fn delete_ledger(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
