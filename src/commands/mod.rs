//! CLI command implementations.

pub mod hooks;
pub mod info;
pub mod run;
pub mod verify;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Read a whole file, naming it in the error.
pub fn read_file(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}: {}", what, path.display()))
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
