//! Dump command implementation.

use super::require_dir;
use crate::OutputFormat;
use chronowal_core::{checksum, CorruptionError, RecordReader, WalError};
use serde::Serialize;
use std::path::Path;

/// WAL record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Stream offset of the record's first fragment.
    pub offset: u64,
    /// Record length in bytes.
    pub len: usize,
    /// CRC32C of the whole record.
    pub crc32c: String,
}

/// Everything a dump found.
#[derive(Debug, Serialize)]
pub struct DumpOutput {
    /// The records read, up to the limit.
    pub records: Vec<RecordInfo>,
    /// Where reading stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corruption: Option<String>,
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    require_dir(path)?;
    let output = collect(path, limit)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            print_text_output(&output);
        }
    }
    Ok(())
}

fn collect(path: &Path, limit: Option<usize>) -> Result<DumpOutput, Box<dyn std::error::Error>> {
    let max_records = limit.unwrap_or(usize::MAX);
    let mut reader = RecordReader::open_dir(path)?;
    let mut records = Vec::new();
    let mut corruption: Option<CorruptionError> = None;

    while records.len() < max_records {
        match reader.next_record() {
            Ok(Some(record)) => {
                let (len, crc) = (record.len(), checksum(record));
                records.push(RecordInfo {
                    offset: reader.record_offset(),
                    len,
                    crc32c: format!("{crc:08x}"),
                });
            }
            Ok(None) => break,
            Err(WalError::Corruption(err)) => {
                corruption = Some(err);
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(DumpOutput {
        records,
        corruption: corruption.map(|err| err.to_string()),
    })
}

fn print_text_output(output: &DumpOutput) {
    println!("WAL Records ({} total)", output.records.len());
    println!("================");
    println!();

    for record in &output.records {
        println!(
            "[{:012}] len={:<8} crc32c={}",
            record.offset, record.len, record.crc32c
        );
    }

    if let Some(ref corruption) = output.corruption {
        println!();
        println!("Stopped at {corruption}");
    }
}
