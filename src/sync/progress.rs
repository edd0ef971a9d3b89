//! Run-scoped progress counters and the sinks that receive notifications.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::host::ProgressEvent;

/// Byte counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Sum of the sizes of every non-link file found while counting.
    pub planned_size: u64,
    /// Sum of the sizes of every file downloaded so far.
    pub downloaded_size: u64,
}

/// Receiver of progress notifications.
///
/// Implementations must not block: notifications are emitted from inside the
/// traversal.
pub trait ProgressSink: Send + Sync {
    /// Handles one notification.
    fn notify(&self, event: ProgressEvent);
}

/// Forwards notifications into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Wraps the sending half of a channel.
    #[must_use]
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn notify(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is watching; the run continues.
        let _ = self.sender.send(event);
    }
}

/// Logs notifications through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn notify(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Size(total) => info!(bytes = total, "planned size computed"),
            ProgressEvent::Zip => info!("packaging archive"),
            other => debug!(?other, "progress"),
        }
    }
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn notify(&self, _event: ProgressEvent) {}
}

/// Which counter a traversal pass advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Count,
    Download,
}

/// Serializes counter updates from concurrent traversal branches and
/// notifies the host after each one.
pub struct ProgressAggregator {
    stats: Mutex<FileStats>,
    sink: Arc<dyn ProgressSink>,
}

impl fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("stats", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl ProgressAggregator {
    /// Creates zeroed counters reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            stats: Mutex::new(FileStats::default()),
            sink,
        }
    }

    /// Adds to both counters and returns the updated totals.
    pub fn increment(&self, planned_delta: u64, downloaded_delta: u64) -> FileStats {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.planned_size = stats.planned_size.saturating_add(planned_delta);
        stats.downloaded_size = stats.downloaded_size.saturating_add(downloaded_delta);
        *stats
    }

    /// Zeroes both counters.
    pub fn reset(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = FileStats::default();
    }

    /// Current totals.
    #[must_use]
    pub fn snapshot(&self) -> FileStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends an event straight to the sink.
    pub fn notify(&self, event: ProgressEvent) {
        self.sink.notify(event);
    }

    /// Advances the counter of `phase` by `bytes` and reports the running total.
    pub(crate) fn record(&self, phase: Phase, bytes: u64) {
        let stats = match phase {
            Phase::Count => self.increment(bytes, 0),
            Phase::Download => self.increment(0, bytes),
        };
        self.report(phase, stats);
    }

    /// Reports the running total of `phase` without changing it.
    pub(crate) fn report_current(&self, phase: Phase) {
        self.report(phase, self.snapshot());
    }

    fn report(&self, phase: Phase, stats: FileStats) {
        self.sink.notify(match phase {
            Phase::Count => ProgressEvent::Fetch(stats.planned_size),
            Phase::Download => ProgressEvent::Perc(stats.downloaded_size),
        });
    }
}
