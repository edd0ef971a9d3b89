//! Run orchestration.
//!
//! [`SyncEngine`] owns the portal handle and the host-facing state that
//! outlives a run: the context of the latest run and the last finished
//! archive. Everything else lives in the [`RunContext`] of one run.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, instrument};

use super::auth::{AuthOutcome, ensure_authenticated};
use super::connection::{ConnectionKind, resolve_connection};
use super::context::RunContext;
use super::error::SyncError;
use super::progress::{FileStats, ProgressSink};
use super::walker::TreeWalker;
use crate::archive::PackagedArchive;
use crate::host::{ArchiveHandoff, HostCommand, ProgressEvent, SyncRequest, SyncResponse};
use crate::portal::{Portal, PortalEndpoints, RemoteNode};

/// Default cap on concurrent portal requests per run.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;

/// Tunables of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Concurrent portal requests allowed per run; `None` is unbounded.
    pub max_in_flight: Option<usize>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_in_flight: Some(DEFAULT_MAX_IN_FLIGHT),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// File name the archive should be saved under.
    pub archive_name: String,
    /// Number of file entries in the archive.
    pub files: usize,
    /// Bytes announced by the counting pass.
    pub planned_size: u64,
    /// Bytes recorded by the download pass.
    pub downloaded_size: u64,
    /// Connection profile the run used.
    pub connection: ConnectionKind,
    /// What the session check found.
    pub auth: AuthOutcome,
}

impl RunSummary {
    /// One-line outcome reported to the host.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "{} files ({} bytes) archived into \"{}\"",
            self.files, self.downloaded_size, self.archive_name
        )
    }
}

#[derive(Default)]
struct EngineState {
    next_run_id: u64,
    current: Option<Arc<RunContext>>,
    archive: Option<PackagedArchive>,
}

/// Drives sync runs against one portal.
pub struct SyncEngine {
    portal: Arc<dyn Portal>,
    endpoints: PortalEndpoints,
    options: SyncOptions,
    sink: Arc<dyn ProgressSink>,
    state: Mutex<EngineState>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("endpoints", &self.endpoints)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine with default options.
    #[must_use]
    pub fn new(
        portal: Arc<dyn Portal>,
        endpoints: PortalEndpoints,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            portal,
            endpoints,
            options: SyncOptions::default(),
            sink,
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Replaces the engine options.
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Mirrors the requested directory into a new archive.
    ///
    /// Starting a run cancels the previous one, zeroes the counters and
    /// discards the previously finished archive. On failure the counters are
    /// reset and `Perc(0)` is emitted.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] of the first phase that failed.
    #[instrument(skip(self, request), fields(root = %request.root_directory_code))]
    pub async fn run(&self, request: &SyncRequest) -> Result<RunSummary, SyncError> {
        let run = self.begin_run();
        info!(run = run.id(), name = %request.root_directory_name, "sync run started");

        match self.execute(&run, request).await {
            Ok(summary) => {
                info!(
                    run = run.id(),
                    files = summary.files,
                    bytes = summary.downloaded_size,
                    "sync run completed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(run = run.id(), error = %e, "sync run failed");
                run.progress().reset();
                if self.is_current(&run) {
                    run.progress().notify(ProgressEvent::Perc(0));
                }
                Err(e)
            }
        }
    }

    /// Runs a request and maps the outcome to the single host reply.
    pub async fn handle(&self, request: SyncRequest) -> SyncResponse {
        match self.run(&request).await {
            Ok(summary) => SyncResponse::success(summary.message()),
            Err(e) => SyncResponse::failure(e.to_string()),
        }
    }

    /// Answers a pull-based host command.
    ///
    /// `GetZipBlob` yields the last finished archive, or `None` when no run
    /// has produced one since the latest run started.
    #[must_use]
    pub fn handle_command(&self, command: HostCommand) -> Option<ArchiveHandoff> {
        match command {
            HostCommand::GetZipBlob => self.state().archive.as_ref().map(|archive| ArchiveHandoff {
                blob: archive.bytes.clone(),
                name: archive.name.clone(),
            }),
        }
    }

    /// Cancels the latest run. Returns false when no run was ever started.
    pub fn cancel_active(&self) -> bool {
        match &self.state().current {
            Some(run) => {
                info!(run = run.id(), "cancelling sync run");
                run.cancel_token().cancel();
                true
            }
            None => false,
        }
    }

    /// Counters of the latest run.
    #[must_use]
    pub fn stats(&self) -> FileStats {
        self.state()
            .current
            .as_ref()
            .map(|run| run.progress().snapshot())
            .unwrap_or_default()
    }

    async fn execute(
        &self,
        run: &RunContext,
        request: &SyncRequest,
    ) -> Result<RunSummary, SyncError> {
        let portal = self.portal.as_ref();
        let profile = resolve_connection(portal, &self.endpoints, run).await?;
        let auth = ensure_authenticated(
            portal,
            &self.endpoints,
            &profile,
            &request.root_directory_code,
            run,
        )
        .await?;

        let root = RemoteNode::dir(
            request.root_directory_code.as_str(),
            request.root_directory_name.as_str(),
        );
        let walker = TreeWalker::new(portal, &self.endpoints, &profile, run);

        let planned_size = walker.count(&root).await?;
        run.progress().notify(ProgressEvent::Size(planned_size));

        let downloaded_size = walker.download(&root).await?;
        run.progress().notify(ProgressEvent::Zip);

        let tree = run.archive().take();
        let name = request.root_directory_name.clone();
        let archive = tokio::task::spawn_blocking(move || tree.write_zip(&name))
            .await
            .map_err(|e| SyncError::PackagingTask(e.to_string()))??;

        let summary = RunSummary {
            archive_name: archive.file_name(),
            files: archive.files,
            planned_size,
            downloaded_size,
            connection: profile.kind(),
            auth,
        };
        self.publish(run, archive)?;
        run.progress().notify(ProgressEvent::Perc(downloaded_size));
        Ok(summary)
    }

    fn begin_run(&self) -> Arc<RunContext> {
        let mut state = self.state();
        if let Some(previous) = state.current.take() {
            previous.cancel_token().cancel();
        }
        state.archive = None;
        state.next_run_id += 1;

        let run = Arc::new(RunContext::new(
            state.next_run_id,
            Arc::clone(&self.sink),
            self.options.max_in_flight,
        ));
        state.current = Some(Arc::clone(&run));
        run
    }

    /// Stores the archive unless the run was superseded or cancelled.
    fn publish(&self, run: &RunContext, archive: PackagedArchive) -> Result<(), SyncError> {
        let mut state = self.state();
        let is_current = state.current.as_ref().is_some_and(|c| c.id() == run.id());
        if !is_current || run.cancel_token().is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        state.archive = Some(archive);
        Ok(())
    }

    fn is_current(&self, run: &RunContext) -> bool {
        self.state()
            .current
            .as_ref()
            .is_some_and(|c| c.id() == run.id())
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
