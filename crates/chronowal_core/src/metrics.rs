//! WAL metrics.
//!
//! The WAL reports what it does through the [`WalMetrics`] observer. It never
//! reads anything back, so any backend can sit behind the trait.
//!
//! # Usage
//!
//! ```rust,ignore
//! use chronowal_core::{Wal, WalConfig, WalStats};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(WalStats::new());
//! let wal = Wal::open_with_config(dir, WalConfig::new().metrics(stats.clone()))?;
//!
//! wal.log(&[b"sample"])?;
//! println!("Page flushes: {}", stats.page_flushes());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Observer for WAL activity.
///
/// All methods default to doing nothing, so implementors only override the
/// signals they care about.
pub trait WalMetrics: Send + Sync {
    /// Records how long one fsync of a segment took.
    fn observe_fsync(&self, _duration: Duration) {}

    /// Counts a page flush, partial or complete.
    fn inc_page_flushes(&self) {}

    /// Counts a page written out in full.
    fn inc_page_completions(&self) {}

    /// Counts an attempted truncation.
    fn inc_truncations(&self) {}

    /// Counts a failed truncation.
    fn inc_truncation_failures(&self) {}

    /// Sets the index of the segment currently written to.
    fn set_current_segment(&self, _index: u64) {}
}

/// Metrics observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl WalMetrics for NoopMetrics {}

/// In-process WAL metrics.
///
/// All counters are atomic and can be read while the WAL is in use.
#[derive(Debug, Default)]
pub struct WalStats {
    fsyncs: AtomicU64,
    fsync_nanos: AtomicU64,
    page_flushes: AtomicU64,
    page_completions: AtomicU64,
    truncations: AtomicU64,
    truncation_failures: AtomicU64,
    current_segment: AtomicU64,
}

impl WalStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of segment fsyncs.
    pub fn fsyncs(&self) -> u64 {
        self.fsyncs.load(Ordering::Relaxed)
    }

    /// Returns the total time spent in segment fsyncs.
    pub fn fsync_time(&self) -> Duration {
        Duration::from_nanos(self.fsync_nanos.load(Ordering::Relaxed))
    }

    /// Returns the number of page flushes.
    pub fn page_flushes(&self) -> u64 {
        self.page_flushes.load(Ordering::Relaxed)
    }

    /// Returns the number of completed pages.
    pub fn page_completions(&self) -> u64 {
        self.page_completions.load(Ordering::Relaxed)
    }

    /// Returns the number of attempted truncations.
    pub fn truncations(&self) -> u64 {
        self.truncations.load(Ordering::Relaxed)
    }

    /// Returns the number of failed truncations.
    pub fn truncation_failures(&self) -> u64 {
        self.truncation_failures.load(Ordering::Relaxed)
    }

    /// Returns the index of the segment currently written to.
    pub fn current_segment(&self) -> u64 {
        self.current_segment.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> WalStatsSnapshot {
        WalStatsSnapshot {
            fsyncs: self.fsyncs(),
            fsync_time: self.fsync_time(),
            page_flushes: self.page_flushes(),
            page_completions: self.page_completions(),
            truncations: self.truncations(),
            truncation_failures: self.truncation_failures(),
            current_segment: self.current_segment(),
        }
    }
}

impl WalMetrics for WalStats {
    fn observe_fsync(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.fsyncs.fetch_add(1, Ordering::Relaxed);
        self.fsync_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn inc_page_flushes(&self) {
        self.page_flushes.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_page_completions(&self) {
        self.page_completions.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_truncations(&self) {
        self.truncations.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_truncation_failures(&self) {
        self.truncation_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn set_current_segment(&self, index: u64) {
        self.current_segment.store(index, Ordering::Relaxed);
    }
}

/// A point-in-time copy of [`WalStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WalStatsSnapshot {
    /// Number of segment fsyncs.
    pub fsyncs: u64,
    /// Total time spent in segment fsyncs.
    pub fsync_time: Duration,
    /// Number of page flushes.
    pub page_flushes: u64,
    /// Number of completed pages.
    pub page_completions: u64,
    /// Number of attempted truncations.
    pub truncations: u64,
    /// Number of failed truncations.
    pub truncation_failures: u64,
    /// Index of the segment currently written to.
    pub current_segment: u64,
}
