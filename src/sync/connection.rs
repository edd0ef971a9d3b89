//! Connection profile selection.
//!
//! The portal serves folders through two list handlers. Which one owns a
//! course is not known up front, so the material handler is probed first and
//! the dropbox handler is assumed otherwise.

use tracing::{info, instrument};

use super::context::RunContext;
use super::error::SyncError;
use crate::portal::{ListOutcome, Portal, PortalEndpoints};

/// The two backend dialects the portal speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Course material folders (`MATDID`).
    Material,
    /// Dropbox folders (`MATDROPBOX`).
    Dropbox,
}

impl ConnectionKind {
    /// Profile code used in download URLs.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Material => "MATDID",
            Self::Dropbox => "MATDROPBOX",
        }
    }
}

/// Active connection: a kind plus the list handler that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    kind: ConnectionKind,
    list_url: String,
}

impl ConnectionProfile {
    /// Builds the profile of `kind` from the configured endpoints.
    #[must_use]
    pub fn new(kind: ConnectionKind, endpoints: &PortalEndpoints) -> Self {
        let list_url = match kind {
            ConnectionKind::Material => endpoints.material_list_url.clone(),
            ConnectionKind::Dropbox => endpoints.dropbox_list_url.clone(),
        };
        Self { kind, list_url }
    }

    /// Kind of the profile.
    #[must_use]
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Profile code used in download URLs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// List handler URL.
    #[must_use]
    pub fn list_url(&self) -> &str {
        &self.list_url
    }
}

/// Probes the portal and returns the active connection profile.
///
/// Lists the material handler's root (empty code). A successful, non-empty
/// answer selects the material profile; a successful empty answer selects
/// the dropbox profile without probing it.
///
/// # Errors
///
/// Returns [`SyncError::ConnectionResolution`] when the probe answers with a
/// non-success status, or [`SyncError::Transport`] when it cannot be sent.
#[instrument(level = "debug", skip_all, fields(run = run.id()))]
pub async fn resolve_connection(
    portal: &dyn Portal,
    endpoints: &PortalEndpoints,
    run: &RunContext,
) -> Result<ConnectionProfile, SyncError> {
    let probe = ConnectionProfile::new(ConnectionKind::Material, endpoints);
    let outcome = run
        .guarded(async { portal.list(probe.list_url(), "").await.map_err(SyncError::from) })
        .await?;

    let kind = match outcome {
        ListOutcome::Listed(nodes) if !nodes.is_empty() => ConnectionKind::Material,
        ListOutcome::Listed(_) => ConnectionKind::Dropbox,
        ListOutcome::Rejected { status } => {
            return Err(SyncError::ConnectionResolution { status });
        }
    };

    info!(connection = kind.code(), "connection type resolved");
    Ok(ConnectionProfile::new(kind, endpoints))
}
