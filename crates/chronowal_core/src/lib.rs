//! # chronowal core
//!
//! Segmented write-ahead log engine for time-series storage.
//!
//! This crate provides:
//! - [`Wal`] - batched, page-framed appends with segment rollover
//! - [`RecordReader`] - record reassembly for replay, with positioned
//!   [`CorruptionError`]s
//! - [`Wal::repair`] - recovery of the readable prefix after corruption
//! - [`Wal::truncate`] - retention by segment index
//! - [`WalMetrics`] - an observer for fsync and flush activity
//!
//! ## Example
//!
//! ```rust
//! use chronowal_core::{RecordReader, Wal, WalConfig, WalError};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = WalConfig::new().segment_size(4 * chronowal_core::PAGE_SIZE);
//! let wal = Wal::open_with_config(dir.path(), config).unwrap();
//!
//! let mut reader = RecordReader::open_dir(dir.path()).unwrap();
//! loop {
//!     match reader.next_record() {
//!         Ok(Some(_record)) => {}
//!         Ok(None) => break,
//!         Err(WalError::Corruption(err)) => {
//!             wal.repair(&err).unwrap();
//!             break;
//!         }
//!         Err(e) => panic!("{e}"),
//!     }
//! }
//!
//! wal.log(&[b"series=1 value=42"]).unwrap();
//! wal.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod metrics;
mod wal;

pub use config::{WalConfig, DEFAULT_QUEUE_CAPACITY, DEFAULT_SEGMENT_SIZE};
pub use error::{CorruptionError, FrameError, WalError, WalResult};
pub use metrics::{NoopMetrics, WalMetrics, WalStats, WalStatsSnapshot};
pub use wal::{
    checksum, encode_fragment, FragmentHeader, FragmentKind, RecordReader, SegmentSource, Wal,
    HEADER_SIZE,
};

pub use chronowal_storage::{
    list_segments, open_segments_range_reader, open_segments_reader, segment_bounds,
    segment_path, SegmentPosition, SegmentRange, SegmentRef, SegmentsReader, PAGE_SIZE,
};
