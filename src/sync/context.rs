//! Per-run state passed explicitly to every phase.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::error::SyncError;
use super::progress::{ProgressAggregator, ProgressSink};
use crate::archive::ArchiveBuilder;

/// State owned by exactly one sync run.
///
/// A new run always gets a new context, so counters and the archive of a
/// previous run can never leak into it.
#[derive(Debug)]
pub struct RunContext {
    id: u64,
    progress: ProgressAggregator,
    archive: ArchiveBuilder,
    limiter: Option<Semaphore>,
    cancel: CancellationToken,
}

impl RunContext {
    /// Creates the context of run `id`.
    ///
    /// `max_in_flight` caps concurrent portal requests; `None` leaves the
    /// fan-out unbounded.
    #[must_use]
    pub fn new(id: u64, sink: Arc<dyn ProgressSink>, max_in_flight: Option<usize>) -> Self {
        Self {
            id,
            progress: ProgressAggregator::new(sink),
            archive: ArchiveBuilder::new(),
            limiter: max_in_flight.map(|permits| Semaphore::new(permits.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    /// Sequence number of the run.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Counters of the run.
    #[must_use]
    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    /// Archive being built by the run.
    #[must_use]
    pub fn archive(&self) -> &ArchiveBuilder {
        &self.archive
    }

    /// Token cancelling every in-flight request of the run.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs one portal request under the in-flight cap, racing cancellation.
    ///
    /// The permit is held only while `request` runs, never across recursion.
    pub(crate) async fn guarded<T, F>(&self, request: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let _permit = match &self.limiter {
            Some(limiter) => tokio::select! {
                () = self.cancel.cancelled() => return Err(SyncError::Cancelled),
                permit = limiter.acquire() => Some(permit.map_err(|_| SyncError::Cancelled)?),
            },
            None => None,
        };

        tokio::select! {
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = request => result,
        }
    }
}
