//! Background finalization of retired segments.
//!
//! When the writer rolls over to a new segment, the previous one still
//! needs an fsync and a close. Both happen on a dedicated thread so that
//! `log` does not wait on the disk. Tasks run in submission order, and the
//! bounded queue applies backpressure to the writer when the disk falls
//! behind.

use crate::error::{WalError, WalResult};
use crate::metrics::WalMetrics;
use chronowal_storage::Segment;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error};

enum FinalizerTask {
    Finalize(Segment),
    Stop,
}

/// Owns the finalizer thread and the sending half of its queue.
pub(crate) struct SegmentFinalizer {
    sender: Option<SyncSender<FinalizerTask>>,
    handle: Option<JoinHandle<()>>,
}

impl SegmentFinalizer {
    /// Starts the finalizer thread with a queue of `capacity` tasks.
    pub(crate) fn spawn(capacity: usize, metrics: Arc<dyn WalMetrics>) -> WalResult<Self> {
        let (sender, receiver) = sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("chronowal-finalizer".to_string())
            .spawn(move || run(receiver, metrics.as_ref()))
            .map_err(WalError::WorkerSpawn)?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queues a retired segment for fsync and close.
    ///
    /// Blocks while the queue is full. If the thread is gone the segment is
    /// finalized inline.
    pub(crate) fn submit(&self, segment: Segment) {
        let Some(sender) = &self.sender else {
            finalize(segment, None);
            return;
        };
        if let Err(err) = sender.send(FinalizerTask::Finalize(segment)) {
            if let FinalizerTask::Finalize(segment) = err.0 {
                finalize(segment, None);
            }
        }
    }

    /// Drains every queued task and stops the thread.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::WorkerPanicked`] if the thread panicked.
    pub(crate) fn shutdown(&mut self) -> WalResult<()> {
        if let Some(sender) = self.sender.take() {
            // A send error means the thread already exited; join reports why.
            let _ = sender.send(FinalizerTask::Stop);
        }
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WalError::WorkerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for SegmentFinalizer {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            error!(error = %err, "segment finalizer did not shut down cleanly");
        }
    }
}

fn run(receiver: Receiver<FinalizerTask>, metrics: &dyn WalMetrics) {
    while let Ok(task) = receiver.recv() {
        match task {
            FinalizerTask::Finalize(segment) => finalize(segment, Some(metrics)),
            FinalizerTask::Stop => break,
        }
    }
    debug!("segment finalizer stopped");
}

/// Fsyncs and closes a segment. Failures are logged, never returned.
fn finalize(segment: Segment, metrics: Option<&dyn WalMetrics>) {
    let index = segment.index();
    let start = Instant::now();
    let synced = segment.sync();
    if let Some(metrics) = metrics {
        metrics.observe_fsync(start.elapsed());
    }
    if let Err(err) = synced {
        error!(segment = index, error = %err, "sync previous segment");
    }
    if let Err(err) = segment.close() {
        error!(segment = index, error = %err, "close previous segment");
    }
}
