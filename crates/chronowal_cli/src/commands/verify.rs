//! Verify command implementation.

use super::require_dir;
use chronowal_core::{RecordReader, WalError};
use std::path::Path;

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of intact records read.
    pub records: usize,
    /// Total payload bytes of the intact records.
    pub bytes: u64,
    /// The corruption that stopped the replay, if any.
    pub corruption: Option<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corruption.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    require_dir(path)?;
    println!("Verifying WAL at {:?}", path);
    println!();

    let result = verify(path)?;
    println!("  Records: {}", result.records);
    println!("  Payload bytes: {}", result.bytes);

    if let Some(ref corruption) = result.corruption {
        println!("  {corruption}");
    }

    println!();
    if result.is_ok() {
        println!("✓ WAL verification passed");
        Ok(())
    } else {
        println!("✗ WAL verification failed");
        Err("Verification failed".into())
    }
}

/// Replays every record in `path`.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult {
        records: 0,
        bytes: 0,
        corruption: None,
    };
    let mut reader = RecordReader::open_dir(path)?;
    loop {
        match reader.next_record() {
            Ok(Some(record)) => {
                result.records += 1;
                result.bytes += record.len() as u64;
            }
            Ok(None) => break,
            Err(WalError::Corruption(err)) => {
                result.corruption = Some(err.to_string());
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(result)
}
