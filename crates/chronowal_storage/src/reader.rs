//! Sequential reading across segment files.
//!
//! [`SegmentsReader`] presents an ordered list of segments as one byte
//! stream. When a segment ends short of a page boundary, the reader
//! synthesizes zero bytes up to the boundary before moving on, so framing
//! code downstream sees the same page-aligned layout a clean shutdown
//! would have produced. The current segment only advances once its last
//! page has been handed out in full, which keeps [`SegmentsReader::position`]
//! pointing at the segment a reader is actually decoding.

use crate::dir::{list_segments, segment_path};
use crate::error::StorageResult;
use crate::segment::Segment;
use crate::PAGE_SIZE;
use std::collections::VecDeque;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Read buffer per segment.
const READ_BUFFER_SIZE: usize = 16 * PAGE_SIZE;

/// A directory plus an inclusive range of segment indices.
///
/// `None` on either end leaves the range open on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRange {
    /// Directory holding the segments.
    pub dir: PathBuf,
    /// First segment to include.
    pub first: Option<u64>,
    /// Last segment to include.
    pub last: Option<u64>,
}

impl SegmentRange {
    /// A range covering every segment in `dir`.
    pub fn all(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            first: None,
            last: None,
        }
    }

    /// Returns true if `index` lies within the range.
    #[must_use]
    pub fn contains(&self, index: u64) -> bool {
        self.first.map_or(true, |first| index >= first)
            && self.last.map_or(true, |last| index <= last)
    }
}

/// Where a [`SegmentsReader`] currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPosition {
    /// Directory of the current segment.
    pub dir: PathBuf,
    /// Index of the current segment.
    pub index: u64,
    /// Offset of the next unread byte within the current segment.
    pub offset: u64,
}

/// A byte stream over consecutive segments.
///
/// The reader owns every segment it was opened with; each file is closed
/// once the stream moves past it, and the remainder are closed on drop.
/// It has no internal locking and is meant for a single consumer.
#[derive(Debug)]
pub struct SegmentsReader {
    current: Option<BufReader<Segment>>,
    pending: VecDeque<Segment>,
    offset: u64,
}

impl SegmentsReader {
    /// Creates a reader over already opened segments, read in the given order.
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut pending: VecDeque<Segment> = segments.into();
        let current = pending
            .pop_front()
            .map(|segment| BufReader::with_capacity(READ_BUFFER_SIZE, segment));
        Self {
            current,
            pending,
            offset: 0,
        }
    }

    /// Returns the current segment and the offset of the next unread byte
    /// in it, or `None` if the reader was opened over no segments.
    #[must_use]
    pub fn position(&self) -> Option<SegmentPosition> {
        self.current.as_ref().map(|reader| {
            let segment = reader.get_ref();
            SegmentPosition {
                dir: segment.dir().to_path_buf(),
                index: segment.index(),
                offset: self.offset,
            }
        })
    }
}

impl Read for SegmentsReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let Some(current) = self.current.as_mut() else {
                return Ok(0);
            };

            let n = current.read(buf)?;
            self.offset += n as u64;
            if n > 0 {
                return Ok(n);
            }

            // The current segment is exhausted. Pad a short last page with
            // zeros before moving on.
            let partial = (self.offset % PAGE_SIZE as u64) as usize;
            if partial != 0 {
                let pad = (PAGE_SIZE - partial).min(buf.len());
                buf[..pad].fill(0);
                self.offset += pad as u64;
                return Ok(pad);
            }

            match self.pending.pop_front() {
                Some(next) => {
                    self.current = Some(BufReader::with_capacity(READ_BUFFER_SIZE, next));
                    self.offset = 0;
                }
                // Keep the last segment so its position stays reportable.
                None => return Ok(0),
            }
        }
    }
}

/// Opens a reader over every segment in `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed, its segments are not
/// sequential, or a segment cannot be opened.
pub fn open_segments_reader(dir: &Path) -> StorageResult<SegmentsReader> {
    open_segments_range_reader(&[SegmentRange::all(dir)])
}

/// Opens a reader over the given segment ranges, in order.
///
/// # Errors
///
/// Same as [`open_segments_reader`], for any of the ranges.
pub fn open_segments_range_reader(ranges: &[SegmentRange]) -> StorageResult<SegmentsReader> {
    let mut segments = Vec::new();
    for range in ranges {
        for r in list_segments(&range.dir)? {
            if !range.contains(r.index) {
                continue;
            }
            segments.push(Segment::open_for_read(&segment_path(&range.dir, r.index))?);
        }
    }
    Ok(SegmentsReader::new(segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_segment(dir: &Path, index: u64, data: &[u8]) {
        fs::write(segment_path(dir, index), data).unwrap();
    }

    fn read_all(mut reader: SegmentsReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn no_segments_is_immediate_eof() {
        let dir = tempdir().unwrap();
        let reader = open_segments_reader(dir.path()).unwrap();
        assert!(reader.position().is_none());
        assert!(read_all(reader).is_empty());
    }

    #[test]
    fn concatenates_aligned_segments() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 0, &vec![1u8; PAGE_SIZE]);
        write_segment(dir.path(), 1, &vec![2u8; 2 * PAGE_SIZE]);

        let data = read_all(open_segments_reader(dir.path()).unwrap());
        assert_eq!(data.len(), 3 * PAGE_SIZE);
        assert!(data[..PAGE_SIZE].iter().all(|&b| b == 1));
        assert!(data[PAGE_SIZE..].iter().all(|&b| b == 2));
    }

    #[test]
    fn pads_short_segments_to_page_boundary() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 0, &[9u8; 10]);
        write_segment(dir.path(), 1, &[8u8; 20]);

        let data = read_all(open_segments_reader(dir.path()).unwrap());
        assert_eq!(data.len(), 2 * PAGE_SIZE);
        assert_eq!(&data[..10], &[9u8; 10]);
        assert!(data[10..PAGE_SIZE].iter().all(|&b| b == 0));
        assert_eq!(&data[PAGE_SIZE..PAGE_SIZE + 20], &[8u8; 20]);
        assert!(data[PAGE_SIZE + 20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn empty_segment_contributes_nothing() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 0, &[]);
        write_segment(dir.path(), 1, &vec![3u8; PAGE_SIZE]);

        let data = read_all(open_segments_reader(dir.path()).unwrap());
        assert_eq!(data.len(), PAGE_SIZE);
    }

    #[test]
    fn position_tracks_segment_and_offset() {
        let dir = tempdir().unwrap();
        write_segment(dir.path(), 4, &vec![1u8; PAGE_SIZE]);
        write_segment(dir.path(), 5, &[2u8; 100]);

        let mut reader = open_segments_reader(dir.path()).unwrap();
        let mut buf = vec![0u8; PAGE_SIZE];
        reader.read_exact(&mut buf).unwrap();
        let pos = reader.position().unwrap();
        assert_eq!(pos.index, 4);
        assert_eq!(pos.offset, PAGE_SIZE as u64);

        let mut small = [0u8; 50];
        reader.read_exact(&mut small).unwrap();
        let pos = reader.position().unwrap();
        assert_eq!(pos.index, 5);
        assert_eq!(pos.offset, 50);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        let pos = reader.position().unwrap();
        assert_eq!(pos.index, 5);
        assert_eq!(pos.offset, PAGE_SIZE as u64);
    }

    #[test]
    fn range_reader_filters_each_range() {
        let dir = tempdir().unwrap();
        for i in 0..5u8 {
            write_segment(dir.path(), u64::from(i), &vec![i; PAGE_SIZE]);
        }

        let ranges = [
            SegmentRange {
                dir: dir.path().to_path_buf(),
                first: Some(1),
                last: Some(2),
            },
            SegmentRange {
                dir: dir.path().to_path_buf(),
                first: Some(4),
                last: None,
            },
        ];
        let reader = open_segments_range_reader(&ranges).unwrap();
        let data = read_all(reader);
        let firsts: Vec<u8> = data.chunks(PAGE_SIZE).map(|page| page[0]).collect();
        assert_eq!(firsts, vec![1, 2, 4]);
    }

    #[test]
    fn range_contains() {
        let range = SegmentRange {
            dir: PathBuf::from("/wal"),
            first: Some(2),
            last: None,
        };
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(100));
        assert!(SegmentRange::all("/wal").contains(0));
    }
}
