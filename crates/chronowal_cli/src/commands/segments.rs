//! Segments command implementation.

use super::require_dir;
use chronowal_storage::{list_segments, PAGE_SIZE};
use std::fs;
use std::path::Path;

/// One line of the segment listing.
#[derive(Debug, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Segment index.
    pub index: u64,
    /// File length in bytes.
    pub len: u64,
}

impl SegmentInfo {
    fn is_torn(&self) -> bool {
        self.len % PAGE_SIZE as u64 != 0
    }
}

/// Runs the segments command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    require_dir(path)?;
    let segments = collect(path)?;

    match (segments.first(), segments.last()) {
        (Some(first), Some(last)) => {
            println!("Segments {}..={} in {:?}", first.index, last.index, path);
        }
        _ => {
            println!("No segments in {:?}", path);
            return Ok(());
        }
    }
    println!();

    for segment in &segments {
        let torn = if segment.is_torn() { "  (torn)" } else { "" };
        println!(
            "{:08}  {:>12} bytes  {:>6} pages{}",
            segment.index,
            segment.len,
            segment.len.div_ceil(PAGE_SIZE as u64),
            torn
        );
    }
    Ok(())
}

fn collect(path: &Path) -> Result<Vec<SegmentInfo>, Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for segment in list_segments(path)? {
        let len = fs::metadata(path.join(&segment.name))?.len();
        out.push(SegmentInfo {
            index: segment.index,
            len,
        });
    }
    Ok(out)
}
