//! Truncate command implementation.

use super::require_dir;
use chronowal_core::Wal;
use std::path::Path;

/// Runs the truncate command.
pub fn run(path: &Path, before: u64) -> Result<(), Box<dyn std::error::Error>> {
    require_dir(path)?;
    let (first, last) = truncate(path, before)?;
    println!("Segments now {first}..={last}");
    Ok(())
}

/// Deletes segments below `before` and returns the remaining bounds.
pub fn truncate(path: &Path, before: u64) -> Result<(u64, u64), Box<dyn std::error::Error>> {
    let wal = Wal::open(path)?;
    wal.truncate(before)?;
    let bounds = wal.segments()?;
    wal.close()?;
    bounds.ok_or_else(|| "WAL has no segments".into())
}
