//! WAL configuration.

use crate::error::{WalError, WalResult};
use crate::metrics::WalMetrics;
use chronowal_storage::PAGE_SIZE;
use std::fmt;
use std::sync::Arc;

/// Default size of a segment file: 128 MiB.
pub const DEFAULT_SEGMENT_SIZE: usize = 128 * 1024 * 1024;

/// Default number of retired segments that may wait for finalization.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Configuration for opening a WAL.
#[derive(Clone)]
pub struct WalConfig {
    /// Size at which the active segment is retired and a new one started.
    /// Must be a positive multiple of [`PAGE_SIZE`].
    pub segment_size: usize,

    /// Bound of the queue feeding the background segment finalizer.
    pub queue_capacity: usize,

    /// Observer for WAL metrics. No metrics are recorded when unset.
    pub metrics: Option<Arc<dyn WalMetrics>>,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            metrics: None,
        }
    }
}

impl WalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment size.
    #[must_use]
    pub const fn segment_size(mut self, size: usize) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the finalizer queue capacity.
    #[must_use]
    pub const fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the metrics observer.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn WalMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of pages in a full segment.
    #[must_use]
    pub const fn pages_per_segment(&self) -> usize {
        self.segment_size / PAGE_SIZE
    }

    /// Checks that the configuration can be used to open a WAL.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::InvalidSegmentSize`] or
    /// [`WalError::InvalidQueueCapacity`].
    pub fn validate(&self) -> WalResult<()> {
        if self.segment_size == 0 || self.segment_size % PAGE_SIZE != 0 {
            return Err(WalError::invalid_segment_size(self.segment_size, PAGE_SIZE));
        }
        if self.queue_capacity == 0 {
            return Err(WalError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

impl fmt::Debug for WalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalConfig")
            .field("segment_size", &self.segment_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::WalStats;

    #[test]
    fn default_config() {
        let config = WalConfig::default();
        assert_eq!(config.segment_size, 128 * 1024 * 1024);
        assert_eq!(config.queue_capacity, 100);
        assert!(config.metrics.is_none());
        assert_eq!(config.pages_per_segment(), 4096);
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern() {
        let config = WalConfig::new()
            .segment_size(4 * PAGE_SIZE)
            .queue_capacity(8)
            .metrics(Arc::new(WalStats::new()));

        assert_eq!(config.segment_size, 4 * PAGE_SIZE);
        assert_eq!(config.queue_capacity, 8);
        assert!(config.metrics.is_some());
        assert_eq!(config.pages_per_segment(), 4);
    }

    #[test]
    fn rejects_unaligned_segment_size() {
        for size in [0, 1, PAGE_SIZE - 1, PAGE_SIZE + 1] {
            let err = WalConfig::new().segment_size(size).validate().unwrap_err();
            assert!(matches!(err, WalError::InvalidSegmentSize { .. }));
        }
    }

    #[test]
    fn rejects_empty_queue() {
        let err = WalConfig::new().queue_capacity(0).validate().unwrap_err();
        assert!(matches!(err, WalError::InvalidQueueCapacity));
    }
}
