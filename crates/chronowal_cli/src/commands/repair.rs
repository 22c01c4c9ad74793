//! Repair command implementation.

use super::require_dir;
use chronowal_core::{RecordReader, Wal, WalError};
use std::path::Path;
use tracing::info;

/// What a repair run did.
#[derive(Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The WAL replayed cleanly; nothing was changed.
    Clean {
        /// Records in the WAL.
        records: usize,
    },
    /// Corruption was found and removed.
    Repaired {
        /// Records that survived the repair.
        records: usize,
    },
}

/// Runs the repair command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    require_dir(path)?;
    println!("Repairing WAL at {:?}", path);
    println!();

    match repair(path)? {
        RepairOutcome::Clean { records } => {
            println!("✓ No corruption found ({records} records)");
        }
        RepairOutcome::Repaired { records } => {
            println!("✓ Repaired, {records} records kept");
        }
    }
    Ok(())
}

/// Replays the WAL in `path` and repairs the first corruption found.
pub fn repair(path: &Path) -> Result<RepairOutcome, Box<dyn std::error::Error>> {
    let wal = Wal::open(path)?;

    let mut records = 0usize;
    let mut corruption = None;
    for item in RecordReader::open_dir(path)? {
        match item {
            Ok(_) => records += 1,
            Err(WalError::Corruption(err)) => {
                corruption = Some(err);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let Some(err) = corruption else {
        wal.close()?;
        return Ok(RepairOutcome::Clean { records });
    };

    info!(error = %err, "repairing wal");
    wal.repair(&err)?;
    wal.close()?;

    let kept = RecordReader::open_dir(path)?.count();
    Ok(RepairOutcome::Repaired { records: kept })
}
