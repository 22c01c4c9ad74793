//! Record reassembly.
//!
//! [`RecordReader`] turns a stream of page-framed fragments back into the
//! records that were logged. It is used for the replay every owner must run
//! before writing to a reopened WAL, and by repair.
//!
//! ## Recovery policy
//!
//! - A clean end of stream between records ends the log.
//! - A terminator byte means the rest of the page is padding; the padding
//!   must be zero up to the page boundary.
//! - Anything else that does not parse is a [`CorruptionError`]: an unknown
//!   kind, a fragment out of sequence, an oversized length, a checksum
//!   mismatch, a fragment cut short, or a stream ending inside a split
//!   record.
//!
//! The reader stops at the first error. Errors carry the segment and the
//! in-segment offset when the source is a [`SegmentsReader`], which is what
//! [`crate::Wal::repair`] needs.

use crate::error::{CorruptionError, FrameError, WalError, WalResult};
use crate::wal::record::{checksum, FragmentHeader, FragmentKind, HEADER_SIZE};
use chronowal_storage::{open_segments_reader, SegmentPosition, SegmentsReader, PAGE_SIZE};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

/// A byte source that may know which segment it is reading.
pub trait SegmentSource: Read {
    /// Returns the segment and in-segment offset of the next unread byte.
    fn segment_position(&self) -> Option<SegmentPosition> {
        None
    }
}

impl SegmentSource for SegmentsReader {
    fn segment_position(&self) -> Option<SegmentPosition> {
        self.position()
    }
}

impl SegmentSource for File {}
impl SegmentSource for &[u8] {}
impl<R: Read> SegmentSource for BufReader<R> {}
impl<T: AsRef<[u8]>> SegmentSource for Cursor<T> {}

impl<S: SegmentSource + ?Sized> SegmentSource for &mut S {
    fn segment_position(&self) -> Option<SegmentPosition> {
        (**self).segment_position()
    }
}

/// Reads records back from a fragment stream.
///
/// # Example
///
/// ```ignore
/// let mut reader = RecordReader::open_dir(dir)?;
/// while let Some(record) = reader.next_record()? {
///     apply(record);
/// }
/// ```
pub struct RecordReader<R> {
    source: R,
    /// Scratch space for one fragment payload or one page of padding.
    buf: Box<[u8]>,
    /// The record being assembled.
    record: Vec<u8>,
    /// Bytes consumed from the source.
    total: u64,
    /// Stream offset of the first fragment of the last record.
    record_start: u64,
    finished: bool,
}

impl RecordReader<SegmentsReader> {
    /// Opens a reader over every segment in `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segments cannot be listed or opened.
    pub fn open_dir(dir: &Path) -> WalResult<Self> {
        Ok(Self::new(open_segments_reader(dir)?))
    }
}

impl<R: SegmentSource> RecordReader<R> {
    /// Creates a reader over `source`, which must start at a page boundary.
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            record: Vec::new(),
            total: 0,
            record_start: 0,
            finished: false,
        }
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` at the end of the log. The returned slice is only
    /// valid until the next call. After an error, every further call
    /// returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Corruption`] for malformed data and
    /// [`WalError::Io`] if the source fails.
    pub fn next_record(&mut self) -> WalResult<Option<&[u8]>> {
        if self.finished {
            return Ok(None);
        }
        match self.read_record() {
            Ok(true) => Ok(Some(&self.record)),
            Ok(false) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                Err(e)
            }
        }
    }

    /// Stream offset just past the last record read.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.total
    }

    /// Stream offset at which the last record read began.
    #[must_use]
    pub fn record_offset(&self) -> u64 {
        self.record_start
    }

    fn read_record(&mut self) -> WalResult<bool> {
        self.record.clear();
        let mut header = [0u8; HEADER_SIZE];
        let mut position = 0usize;

        loop {
            let fragment_start = self.total;
            if self.fill(&mut header[..1])? == 0 {
                if position > 0 {
                    return Err(self.corruption(FrameError::TornRecord));
                }
                return Ok(false);
            }

            let Some(kind) = FragmentKind::from_byte(header[0]) else {
                return Err(self.corruption(FrameError::InvalidKind(header[0])));
            };

            if kind == FragmentKind::Terminator {
                self.skip_padding()?;
                continue;
            }

            // A fragment never crosses its page: the header and payload must
            // fit in what is left of the page the fragment starts in.
            let page_left = PAGE_SIZE - (fragment_start % PAGE_SIZE as u64) as usize;
            if page_left < HEADER_SIZE {
                return Err(self.corruption(FrameError::Truncated));
            }

            if self.fill(&mut header[1..])? < HEADER_SIZE - 1 {
                return Err(self.corruption(FrameError::Truncated));
            }
            let header = FragmentHeader::decode(&header)
                .map_err(|byte| self.corruption(FrameError::InvalidKind(byte)))?;

            let len = usize::from(header.len);
            if HEADER_SIZE + len > page_left {
                return Err(self.corruption(FrameError::LengthTooLarge(len)));
            }
            if self.fill_scratch(len)? < len {
                return Err(self.corruption(FrameError::Truncated));
            }

            let computed = checksum(&self.buf[..len]);
            if computed != header.crc {
                return Err(self.corruption(FrameError::ChecksumMismatch {
                    stored: header.crc,
                    computed,
                }));
            }

            let in_sequence = match kind {
                FragmentKind::Full | FragmentKind::First => position == 0,
                _ => position > 0,
            };
            if !in_sequence {
                return Err(self.corruption(FrameError::UnexpectedKind { kind, position }));
            }

            if position == 0 {
                self.record_start = fragment_start;
            }
            self.record.extend_from_slice(&self.buf[..len]);

            if kind.ends_record() {
                return Ok(true);
            }
            position += 1;
        }
    }

    /// Consumes the zero padding that follows a terminator byte up to the
    /// next page boundary.
    fn skip_padding(&mut self) -> WalResult<()> {
        let rest = PAGE_SIZE - (self.total % PAGE_SIZE as u64) as usize;
        if rest == PAGE_SIZE {
            // The terminator was the last byte of its page.
            return Ok(());
        }
        if self.fill_scratch(rest)? < rest {
            return Err(self.corruption(FrameError::Truncated));
        }
        if self.buf[..rest].iter().any(|&b| b != 0) {
            return Err(self.corruption(FrameError::NonZeroPadding));
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = read_full(&mut self.source, buf)?;
        self.total += n as u64;
        Ok(n)
    }

    fn fill_scratch(&mut self, len: usize) -> io::Result<usize> {
        let n = read_full(&mut self.source, &mut self.buf[..len])?;
        self.total += n as u64;
        Ok(n)
    }

    fn corruption(&self, cause: FrameError) -> WalError {
        let err = match self.source.segment_position() {
            Some(pos) => CorruptionError::in_segment(pos.dir, pos.index, pos.offset, cause),
            None => CorruptionError::at_offset(self.total, cause),
        };
        err.into()
    }
}

impl<R: SegmentSource> Iterator for RecordReader<R> {
    type Item = WalResult<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.next_record() {
            Ok(Some(record)) => record.to_vec(),
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok((self.record_start, record)))
    }
}

impl<R> std::fmt::Debug for RecordReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("total", &self.total)
            .field("record_start", &self.record_start)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Reads until `buf` is full or the source is exhausted.
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
