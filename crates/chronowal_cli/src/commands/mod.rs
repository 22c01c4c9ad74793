//! CLI command implementations.

pub mod dump;
pub mod repair;
pub mod segments;
pub mod truncate;
pub mod verify;

use std::path::Path;

/// Fails unless `path` is an existing directory.
fn require_dir(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("WAL directory not found: {}", path.display()).into());
    }
    Ok(())
}
