//! # chronowal storage
//!
//! Segment files and directories for the chronowal write-ahead log.
//!
//! This crate is the file layer underneath the WAL engine. It knows that
//! segments are written in whole pages of [`PAGE_SIZE`] bytes, but it does
//! not interpret what is inside a page; record framing lives in
//! `chronowal_core`.
//!
//! ## Provided pieces
//!
//! - [`Segment`] - one segment file, opened for create, append or read
//! - [`list_segments`] / [`segment_bounds`] - contiguous directory listing
//! - [`SegmentsReader`] - one byte stream over many segments, zero-padding
//!   torn pages
//!
//! ## Example
//!
//! ```rust
//! use chronowal_storage::{open_segments_reader, Segment};
//! use std::io::{Read, Write};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut segment = Segment::create(dir.path(), 0).unwrap();
//! segment.write_all(b"hello").unwrap();
//! drop(segment);
//!
//! let mut data = Vec::new();
//! open_segments_reader(dir.path()).unwrap().read_to_end(&mut data).unwrap();
//! assert_eq!(&data[..5], b"hello");
//! assert_eq!(data.len(), chronowal_storage::PAGE_SIZE);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod reader;
mod segment;

pub use dir::{list_segments, segment_bounds, segment_path, sync_dir, SegmentRef};
pub use error::{StorageError, StorageResult};
pub use reader::{
    open_segments_range_reader, open_segments_reader, SegmentPosition, SegmentRange,
    SegmentsReader,
};
pub use segment::Segment;

/// Size of a page, the unit in which segments are written.
pub const PAGE_SIZE: usize = 32 * 1024;
