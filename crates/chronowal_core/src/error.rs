//! Error types for the WAL engine.

use chronowal_storage::{segment_path, StorageError};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::wal::FragmentKind;

/// Result type for WAL operations.
pub type WalResult<T> = Result<T, WalError>;

/// Errors that can occur in WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// Segment storage error, including directory sequencing errors.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corrupted data found while reading records.
    #[error(transparent)]
    Corruption(#[from] CorruptionError),

    /// The configured segment size is not a positive multiple of the page size.
    #[error("invalid segment size {size}: must be a positive multiple of {page_size}")]
    InvalidSegmentSize {
        /// The rejected segment size.
        size: usize,
        /// The page size it must be a multiple of.
        page_size: usize,
    },

    /// The finalizer queue must hold at least one task.
    #[error("invalid finalizer queue capacity: must be at least 1")]
    InvalidQueueCapacity,

    /// The WAL was already closed.
    #[error("WAL already closed")]
    AlreadyClosed,

    /// There is no active segment to write to.
    #[error("no active segment: a previous repair did not complete")]
    NoActiveSegment,

    /// Fragment framing was asked to encode something it cannot hold.
    #[error("invalid fragment: {0}")]
    Frame(#[from] FrameError),

    /// A corruption error names a segment that is not part of this WAL.
    #[error("segment {segment} of {} is not part of this WAL", .dir.display())]
    UnknownRepairTarget {
        /// Directory named by the corruption error.
        dir: PathBuf,
        /// Segment named by the corruption error.
        segment: u64,
    },

    /// A corruption error without a segment position cannot be repaired.
    #[error("corruption error does not specify a segment position")]
    UnpositionedCorruption,

    /// The background finalizer thread could not be started.
    #[error("failed to spawn segment finalizer: {0}")]
    WorkerSpawn(io::Error),

    /// The background finalizer thread panicked.
    #[error("segment finalizer panicked")]
    WorkerPanicked,
}

impl WalError {
    /// Creates an invalid segment size error.
    pub fn invalid_segment_size(size: usize, page_size: usize) -> Self {
        Self::InvalidSegmentSize { size, page_size }
    }

    /// Returns the corruption details if this is a corruption error.
    #[must_use]
    pub fn as_corruption(&self) -> Option<&CorruptionError> {
        match self {
            Self::Corruption(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this is a corruption error.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        self.as_corruption().is_some()
    }
}

/// Corruption found while reassembling records.
///
/// Carries the position needed to repair the log: the segment and the byte
/// offset within it where reading failed. When the records were read from a
/// plain byte stream rather than from segments, `segment` is `None` and
/// `offset` counts bytes from the start of the stream.
#[derive(Debug, Error)]
pub struct CorruptionError {
    /// Directory of the corrupted segment, when known.
    pub dir: Option<PathBuf>,
    /// Index of the corrupted segment, when known.
    pub segment: Option<u64>,
    /// Byte offset at which the corruption was detected.
    pub offset: u64,
    /// What was wrong with the data.
    #[source]
    pub cause: FrameError,
}

impl CorruptionError {
    /// Creates a corruption error positioned within a segment.
    pub fn in_segment(dir: impl Into<PathBuf>, segment: u64, offset: u64, cause: FrameError) -> Self {
        Self {
            dir: Some(dir.into()),
            segment: Some(segment),
            offset,
            cause,
        }
    }

    /// Creates a corruption error positioned only by stream offset.
    pub fn at_offset(offset: u64, cause: FrameError) -> Self {
        Self {
            dir: None,
            segment: None,
            offset,
            cause,
        }
    }
}

impl fmt::Display for CorruptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segment {
            Some(segment) => {
                let dir = self.dir.clone().unwrap_or_default();
                write!(
                    f,
                    "corruption in segment {} at {}: {}",
                    segment_path(&dir, segment).display(),
                    self.offset,
                    self.cause
                )
            }
            None => write!(
                f,
                "corruption after {} bytes: {}",
                self.offset, self.cause
            ),
        }
    }
}

/// What made a fragment unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The fragment kind byte is not a known kind.
    #[error("invalid fragment kind {0}")]
    InvalidKind(u8),

    /// A fragment kind appeared out of order within a record.
    #[error("unexpected {kind} fragment at position {position} of record")]
    UnexpectedKind {
        /// Kind that was found.
        kind: FragmentKind,
        /// Zero-based fragment position within the record.
        position: usize,
    },

    /// The fragment length exceeds what a page can hold.
    #[error("invalid fragment length {0}")]
    LengthTooLarge(usize),

    /// The payload checksum does not match.
    #[error("unexpected checksum {computed:08x}, expected {stored:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the header.
        stored: u32,
        /// Checksum computed over the payload.
        computed: u32,
    },

    /// A padded page region contains non-zero bytes.
    #[error("unexpected non-zero byte in padded page")]
    NonZeroPadding,

    /// The stream ended inside a fragment.
    #[error("truncated fragment")]
    Truncated,

    /// The stream ended between fragments of an unfinished record.
    #[error("last record is torn")]
    TornRecord,
}
