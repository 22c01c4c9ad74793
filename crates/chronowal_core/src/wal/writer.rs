//! The WAL writer.
//!
//! [`Wal`] appends batches of records to the active segment through a
//! single page buffer. Records are split into fragments that never cross a
//! page, and a record never crosses a segment: when it does not fit in what
//! is left of the active segment, the writer rolls over first.
//!
//! Every mutation runs under one lock. Retired segments are handed to the
//! background finalizer, so `log` never waits on their fsync.

use crate::config::WalConfig;
use crate::error::{WalError, WalResult};
use crate::metrics::{NoopMetrics, WalMetrics};
use crate::wal::page::Page;
use crate::wal::record::{encode_fragment, FragmentKind, HEADER_SIZE};
use crate::wal::worker::SegmentFinalizer;
use chronowal_storage::{list_segments, segment_bounds, sync_dir, Segment, PAGE_SIZE};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// A segmented write-ahead log.
///
/// Opening a WAL over existing segments appends to the last one. The owner
/// must replay the existing records with
/// [`RecordReader`](crate::RecordReader) before logging new ones, and call
/// [`Wal::repair`] if the replay reports corruption.
///
/// # Example
///
/// ```rust
/// use chronowal_core::{RecordReader, Wal};
///
/// let dir = tempfile::tempdir().unwrap();
/// let wal = Wal::open(dir.path()).unwrap();
/// wal.log(&[b"cpu=0.5", b"mem=0.3"]).unwrap();
/// wal.close().unwrap();
///
/// let records: Vec<_> = RecordReader::open_dir(dir.path())
///     .unwrap()
///     .map(|r| r.unwrap().1)
///     .collect();
/// assert_eq!(records, vec![b"cpu=0.5".to_vec(), b"mem=0.3".to_vec()]);
/// ```
pub struct Wal {
    pub(super) dir: PathBuf,
    segment_size: usize,
    pages_per_segment: usize,
    metrics: Arc<dyn WalMetrics>,
    pub(super) state: Mutex<WalState>,
}

/// Everything guarded by the WAL lock.
pub(super) struct WalState {
    /// The active segment. `None` after close, or if a repair failed
    /// before installing its fresh segment.
    pub(super) segment: Option<Segment>,
    pub(super) page: Page,
    /// Pages of the active segment already written in full.
    done_pages: usize,
    pub(super) finalizer: SegmentFinalizer,
    pub(super) closed: bool,
}

impl WalState {
    /// Makes `segment` the active one and returns the previous segment.
    pub(super) fn set_segment(
        &mut self,
        segment: Segment,
        metrics: &dyn WalMetrics,
    ) -> WalResult<Option<Segment>> {
        let len = segment.len()?;
        self.done_pages = usize::try_from(len / PAGE_SIZE as u64).unwrap_or(usize::MAX);
        metrics.set_current_segment(segment.index());
        Ok(self.segment.replace(segment))
    }

    fn is_segment_empty(&self) -> bool {
        self.done_pages == 0 && self.page.is_empty()
    }
}

impl Wal {
    /// Opens the WAL in `dir` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Wal::open_with_config`].
    pub fn open(dir: impl AsRef<Path>) -> WalResult<Self> {
        Self::open_with_config(dir, WalConfig::default())
    }

    /// Opens the WAL in `dir` with the given segment size.
    ///
    /// # Errors
    ///
    /// See [`Wal::open_with_config`].
    pub fn open_with_segment_size(dir: impl AsRef<Path>, segment_size: usize) -> WalResult<Self> {
        Self::open_with_config(dir, WalConfig::new().segment_size(segment_size))
    }

    /// Opens the WAL in `dir`, creating the directory and the first segment
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the segments in
    /// `dir` are not sequential, or the active segment cannot be opened.
    pub fn open_with_config(dir: impl AsRef<Path>, config: WalConfig) -> WalResult<Self> {
        config.validate()?;
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let metrics = config
            .metrics
            .clone()
            .unwrap_or_else(|| Arc::new(NoopMetrics));

        let segment = match segment_bounds(&dir)? {
            None => {
                let segment = Segment::create(&dir, 0)?;
                sync_dir(&dir)?;
                segment
            }
            Some((_, last)) => Segment::open_for_write(&dir, last)?,
        };
        debug!(dir = %dir.display(), segment = segment.index(), "opened wal");

        let mut state = WalState {
            segment: None,
            page: Page::new(),
            done_pages: 0,
            finalizer: SegmentFinalizer::spawn(config.queue_capacity, metrics.clone())?,
            closed: false,
        };
        state.set_segment(segment, metrics.as_ref())?;

        Ok(Self {
            dir,
            segment_size: config.segment_size,
            pages_per_segment: config.pages_per_segment(),
            metrics,
            state: Mutex::new(state),
        })
    }

    /// Returns the WAL directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the configured segment size.
    #[must_use]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Returns the index of the active segment, if there is one.
    pub fn active_segment(&self) -> Option<u64> {
        self.state.lock().segment.as_ref().map(Segment::index)
    }

    /// Returns the first and last segment index in the directory, or `None`
    /// if there are no segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or has gaps.
    pub fn segments(&self) -> WalResult<Option<(u64, u64)>> {
        Ok(segment_bounds(&self.dir)?)
    }

    /// Appends a batch of records.
    ///
    /// The batch is written without interleaving with other calls, and the
    /// page holding its last record is flushed to the segment before
    /// returning. An empty batch does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::AlreadyClosed`] after close, or the I/O error of
    /// a failed write. A failed write can be retried; the page resumes from
    /// the last byte the OS accepted.
    pub fn log<R: AsRef<[u8]>>(&self, records: &[R]) -> WalResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WalError::AlreadyClosed);
        }
        let last = records.len().saturating_sub(1);
        for (i, record) in records.iter().enumerate() {
            self.log_record(&mut state, record.as_ref(), i == last)?;
        }
        Ok(())
    }

    /// Appends a single record.
    ///
    /// # Errors
    ///
    /// Same as [`Wal::log`].
    pub fn log_one(&self, record: &[u8]) -> WalResult<()> {
        self.log(&[record])
    }

    /// Writes one record into the page buffer, flushing as it goes.
    pub(super) fn log_record(
        &self,
        state: &mut WalState,
        record: &[u8],
        is_final: bool,
    ) -> WalResult<()> {
        // Only left full by a failed flush.
        if state.page.is_full() {
            self.flush_page(state, true)?;
        }

        let pages_per_segment = i64::try_from(self.pages_per_segment).unwrap_or(i64::MAX);
        let done_pages = i64::try_from(state.done_pages).unwrap_or(i64::MAX);
        let left = (state.page.remaining() - HEADER_SIZE) as i64
            + (PAGE_SIZE - HEADER_SIZE) as i64 * (pages_per_segment - done_pages - 1);
        let no_room = record.len() as i64 > left || done_pages >= pages_per_segment;
        if no_room && !state.is_segment_empty() {
            self.next_segment(state)?;
        }

        let mut rest = record;
        let mut first = true;
        loop {
            let page = &mut state.page;
            let len = rest.len().min(page.remaining() - HEADER_SIZE);
            let (chunk, tail) = rest.split_at(len);
            let kind = FragmentKind::for_position(first, tail.is_empty());

            let alloc = page.alloc;
            page.alloc += encode_fragment(&mut page.buf[alloc..], kind, chunk)?;

            if is_final || kind != FragmentKind::Full || page.is_full() {
                self.flush_page(state, false)?;
            }
            if tail.is_empty() {
                return Ok(());
            }
            rest = tail;
            first = false;
        }
    }

    /// Writes the unflushed part of the page to the active segment.
    ///
    /// A forced or full page is completed: padded with zeros to its end,
    /// written out and reset.
    fn flush_page(&self, state: &mut WalState, force: bool) -> WalResult<()> {
        self.metrics.inc_page_flushes();
        let WalState {
            segment,
            page,
            done_pages,
            ..
        } = state;
        let segment = segment.as_mut().ok_or(WalError::NoActiveSegment)?;

        let complete = force || page.is_full();
        if complete {
            page.alloc = PAGE_SIZE;
        }
        while page.flushed < page.alloc {
            match segment.write(&page.buf[page.flushed..page.alloc]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => page.flushed += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if complete {
            page.reset();
            *done_pages += 1;
            self.metrics.inc_page_completions();
        }
        Ok(())
    }

    /// Completes the current page, starts the next segment and queues the
    /// previous one for finalization.
    fn next_segment(&self, state: &mut WalState) -> WalResult<()> {
        if !state.page.is_empty() {
            self.flush_page(state, true)?;
        }
        let current = state
            .segment
            .as_ref()
            .map(Segment::index)
            .ok_or(WalError::NoActiveSegment)?;

        let next = Segment::create(&self.dir, current + 1)?;
        sync_dir(&self.dir)?;
        debug!(segment = current + 1, "rolled over to new segment");

        if let Some(previous) = state.set_segment(next, self.metrics.as_ref())? {
            state.finalizer.submit(previous);
        }
        Ok(())
    }

    /// Deletes every segment with an index below `min_index`.
    ///
    /// Segments are removed in ascending order; a failure stops the
    /// deletion and leaves the already removed segments removed. The active
    /// segment is never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::AlreadyClosed`] after close, or the first error
    /// hit while listing or removing segments.
    pub fn truncate(&self, min_index: u64) -> WalResult<()> {
        let state = self.state.lock();
        if state.closed {
            return Err(WalError::AlreadyClosed);
        }
        self.metrics.inc_truncations();

        let active = state.segment.as_ref().map(Segment::index);
        let result = self.remove_segments_below(min_index, active);
        if result.is_err() {
            self.metrics.inc_truncation_failures();
        }
        result
    }

    fn remove_segments_below(&self, min_index: u64, active: Option<u64>) -> WalResult<()> {
        for segment in list_segments(&self.dir)? {
            if segment.index >= min_index {
                break;
            }
            if Some(segment.index) == active {
                warn!(
                    segment = segment.index,
                    min_index, "not truncating the active segment"
                );
                break;
            }
            fs::remove_file(self.dir.join(&segment.name))?;
        }
        Ok(())
    }

    /// Flushes the page, waits for every retired segment to be finalized,
    /// then syncs and closes the active segment.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::AlreadyClosed`] on a second call, or the error of
    /// the flush, the finalizer shutdown or the final sync.
    pub fn close(&self) -> WalResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WalError::AlreadyClosed);
        }
        // An empty page must stay unwritten; a completed page would make a
        // reopen skip the rest of it.
        if !state.page.is_empty() {
            self.flush_page(&mut state, true)?;
        }
        state.finalizer.shutdown()?;
        state.closed = true;

        if let Some(segment) = state.segment.take() {
            let start = Instant::now();
            let synced = segment.sync();
            self.metrics.observe_fsync(start.elapsed());
            synced?;
            segment.close()?;
        }
        Ok(())
    }

    pub(super) fn metrics(&self) -> &dyn WalMetrics {
        self.metrics.as_ref()
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if self.state.get_mut().closed {
            return;
        }
        if let Err(err) = self.close() {
            error!(dir = %self.dir.display(), error = %err, "failed to close wal");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("dir", &self.dir)
            .field("segment_size", &self.segment_size)
            .finish_non_exhaustive()
    }
}
