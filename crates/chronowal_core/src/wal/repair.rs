//! Repair of a corrupted WAL.

use crate::error::{CorruptionError, WalError, WalResult};
use crate::wal::reader::RecordReader;
use crate::wal::writer::Wal;
use chronowal_storage::{list_segments, segment_path, sync_dir, Segment};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::warn;

impl Wal {
    /// Repairs the WAL after a replay reported `err`.
    ///
    /// Every segment after the corrupted one is deleted. The corrupted
    /// segment is rewritten with the records that start before the
    /// corruption offset, and becomes the active segment. Afterwards the
    /// WAL replays cleanly and accepts new records.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::UnpositionedCorruption`] if `err` does not name a
    /// segment, [`WalError::UnknownRepairTarget`] if that segment is not in
    /// this WAL's directory, [`WalError::AlreadyClosed`] after close, or the
    /// I/O error
    /// that stopped the repair. A repair interrupted after the corrupted
    /// segment was moved aside leaves no active segment; logging then fails
    /// with [`WalError::NoActiveSegment`].
    pub fn repair(&self, err: &CorruptionError) -> WalResult<()> {
        let target = err.segment.ok_or(WalError::UnpositionedCorruption)?;

        let mut state = self.state.lock();
        if state.closed {
            return Err(WalError::AlreadyClosed);
        }

        // Nothing is touched until the target is known to be ours.
        let unknown = || WalError::UnknownRepairTarget {
            dir: err.dir.clone().unwrap_or_else(|| self.dir.clone()),
            segment: target,
        };
        if err.dir.as_deref().is_some_and(|dir| !same_dir(dir, &self.dir)) {
            return Err(unknown());
        }
        let segments = list_segments(&self.dir)?;
        if !segments.iter().any(|s| s.index == target) {
            return Err(unknown());
        }
        warn!(segment = target, offset = err.offset, cause = %err.cause, "starting corruption repair");

        // The active segment is either deleted or replaced below.
        if state.segment.as_ref().is_some_and(|s| s.index() >= target) {
            if let Some(active) = state.segment.take() {
                active.close()?;
            }
        }
        state.page.reset();

        for segment in segments {
            if segment.index <= target {
                continue;
            }
            warn!(segment = segment.index, "deleting segment");
            fs::remove_file(self.dir.join(&segment.name))?;
        }

        let corrupted = segment_path(&self.dir, target);
        let mut aside = corrupted.clone().into_os_string();
        aside.push(".repair");
        let aside = PathBuf::from(aside);
        fs::rename(&corrupted, &aside)?;
        sync_dir(&self.dir)?;

        warn!(segment = target, "rewriting corrupted segment");
        let fresh = Segment::create(&self.dir, target)?;
        sync_dir(&self.dir)?;
        if let Some(previous) = state.set_segment(fresh, self.metrics())? {
            state.finalizer.submit(previous);
        }

        let mut kept = 0usize;
        {
            let reader = RecordReader::new(BufReader::new(File::open(&aside)?));
            for item in reader {
                let (offset, record) = match item {
                    Ok(item) => item,
                    // Reading is expected to fail at the corruption.
                    Err(e) if e.is_corruption() => break,
                    Err(e) => return Err(e),
                };
                if offset >= err.offset {
                    break;
                }
                self.log_record(&mut state, &record, true)?;
                kept += 1;
            }
        }

        fs::remove_file(&aside)?;
        warn!(segment = target, records = kept, "corruption repair finished");
        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
