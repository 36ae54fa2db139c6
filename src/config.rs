//! Data directory resolution.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variable (LOREWEAVE_HOME)
//! 2. Default (~/.loreweave)

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Directory holding the canon database (`$LOREWEAVE_HOME` or `~/.loreweave`)
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("LOREWEAVE_HOME") {
        if !home.is_empty() {
            return Ok(PathBuf::from(home));
        }
    }

    let home = dirs::home_dir().context("Failed to determine home directory")?;
    Ok(home.join(".loreweave"))
}

/// Path to the canon database file
pub fn db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("canon.db"))
}
