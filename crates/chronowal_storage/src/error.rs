//! Error types for segment storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while managing segment files.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A segment file name does not parse as a segment index.
    #[error("not a valid segment file name: {name}")]
    InvalidSegmentName {
        /// The offending file name.
        name: String,
    },

    /// The segment directory has a gap in its indices.
    #[error("segments in {} are not sequential: {previous} is followed by {next}", dir.display())]
    NonSequentialSegments {
        /// Directory that was listed.
        dir: PathBuf,
        /// Last index before the gap.
        previous: u64,
        /// First index after the gap.
        next: u64,
    },
}
