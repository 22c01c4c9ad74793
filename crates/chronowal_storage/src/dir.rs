//! Segment directory management.
//!
//! A WAL directory holds one file per segment:
//!
//! ```text
//! <wal_dir>/
//! ├─ 00000000
//! ├─ 00000001
//! └─ 00000002
//! ```
//!
//! Entries whose names are not plain decimal numbers are ignored, which
//! leaves room for temporary files such as `00000001.repair`. The numeric
//! entries must form a contiguous run of indices.

use crate::error::{StorageError, StorageResult};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// A segment file found in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// File name within the directory.
    pub name: String,
    /// Segment index parsed from the name.
    pub index: u64,
}

/// Builds the path of segment `index` inside `dir`.
#[must_use]
pub fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{index:08}"))
}

/// Parses a segment index from a file name.
///
/// Only non-empty strings of ASCII digits are accepted.
pub(crate) fn parse_segment_name(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Lists the segments in `dir` in ascending index order.
///
/// An empty result is a valid state for a fresh directory.
///
/// # Errors
///
/// Returns [`StorageError::NonSequentialSegments`] if the indices have a gap,
/// or an I/O error if the directory cannot be read.
pub fn list_segments(dir: &Path) -> StorageResult<Vec<SegmentRef>> {
    let mut refs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(index) = parse_segment_name(&name) {
            refs.push(SegmentRef { name, index });
        }
    }
    refs.sort_by_key(|r| r.index);

    for pair in refs.windows(2) {
        if pair[1].index != pair[0].index + 1 {
            return Err(StorageError::NonSequentialSegments {
                dir: dir.to_path_buf(),
                previous: pair[0].index,
                next: pair[1].index,
            });
        }
    }

    Ok(refs)
}

/// Returns the first and last segment index in `dir`, or `None` if the
/// directory holds no segments.
///
/// # Errors
///
/// Same as [`list_segments`].
pub fn segment_bounds(dir: &Path) -> StorageResult<Option<(u64, u64)>> {
    let refs = list_segments(dir)?;
    Ok(match (refs.first(), refs.last()) {
        (Some(first), Some(last)) => Some((first.index, last.index)),
        _ => None,
    })
}

/// Syncs the directory so that created, renamed and removed entries are
/// durable.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Syncs the directory so that created, renamed and removed entries are
/// durable.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    // NTFS journals directory metadata; there is no directory fsync.
    Ok(())
}
