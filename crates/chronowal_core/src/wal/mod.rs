//! The write-ahead log.
//!
//! Records are appended to numbered segment files. Each segment is written
//! in pages of [`PAGE_SIZE`](chronowal_storage::PAGE_SIZE) bytes, and every
//! record is stored as one or more fragments that never cross a page.
//!
//! ## Fragment Format
//!
//! ```text
//! | kind (1) | length (2, BE) | crc32c (4, BE) | payload (length) |
//! ```
//!
//! A record that fits in the rest of a page is one `full` fragment. A larger
//! record becomes `first`, zero or more `middle`, and `last`. A zero kind
//! byte marks the start of zero padding that runs to the end of the page.
//!
//! ## Invariants
//!
//! - A record never crosses a segment boundary
//! - Segment files only ever grow in whole pages, except for the page
//!   currently being written
//! - Retired segments are fsynced in the order they were retired
//! - Replay stops at the first corrupted fragment; [`Wal::repair`] removes
//!   it and everything after it

mod page;
mod reader;
mod record;
mod repair;
mod worker;
mod writer;

pub use reader::{RecordReader, SegmentSource};
pub use record::{checksum, encode_fragment, FragmentHeader, FragmentKind, HEADER_SIZE};
pub use writer::Wal;
