//! Error types for a sync run.
//!
//! Every phase failure aborts the run; the `Display` text of the error is the
//! single reason reported back to the host.

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::portal::{LoginFormError, PortalError};

/// Reasons the session authenticator can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Listing the root directory did not succeed.
    #[error("login error (status: {status})")]
    ProbeRejected {
        /// HTTP status of the root listing.
        status: u16,
    },

    /// The identity provider page could not be turned into a replay.
    #[error("login error: {0}")]
    LoginForm(#[from] LoginFormError),

    /// A request of the login check or replay could not be completed.
    #[error("login error: {0}")]
    Transport(#[from] PortalError),

    /// The replayed login form was not accepted.
    #[error("login error (status: {status})")]
    ReplayRejected {
        /// HTTP status of the replay POST.
        status: u16,
    },
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connection probe did not succeed.
    #[error("cannot determine connection type (status: {status})")]
    ConnectionResolution {
        /// HTTP status of the probe listing.
        status: u16,
    },

    /// The session could not be validated or established.
    #[error(transparent)]
    Authentication(#[from] AuthError),

    /// A directory listing did not succeed.
    #[error("error in fetching dir \"{path}\" (status: {status})")]
    Traversal {
        /// Archive path of the directory (its name is the last segment).
        path: String,
        /// HTTP status of the listing.
        status: u16,
    },

    /// A file download did not succeed.
    #[error("error in downloading file \"{name}\" (status: {status})")]
    Download {
        /// Name of the file.
        name: String,
        /// HTTP status of the download.
        status: u16,
    },

    /// A download landed on the identity provider instead of the file.
    #[error("session expired while downloading file \"{name}\"")]
    SessionExpired {
        /// Name of the file.
        name: String,
    },

    /// Packaging the archive failed.
    #[error("failed to package archive: {0}")]
    Packaging(#[from] ArchiveError),

    /// The packaging task panicked or was aborted.
    #[error("packaging task failed: {0}")]
    PackagingTask(String),

    /// A request failed below the HTTP layer.
    #[error(transparent)]
    Transport(#[from] PortalError),

    /// The run was cancelled before it completed.
    #[error("sync run cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates a listing failure error.
    pub fn traversal(path: impl Into<String>, status: u16) -> Self {
        Self::Traversal {
            path: path.into(),
            status,
        }
    }

    /// Creates a file download failure error.
    pub fn download(name: impl Into<String>, status: u16) -> Self {
        Self::Download {
            name: name.into(),
            status,
        }
    }
}
