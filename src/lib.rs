//! Coursezip Core Library
//!
//! This library mirrors a folder tree published by the university course
//! portal into a single ZIP archive.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`portal`] - Transport gateway for the portal's list, file and login endpoints
//! - [`sync`] - Connection probe, session authenticator, tree walker and run orchestration
//! - [`archive`] - In-memory folder tree finalized into ZIP bytes
//! - [`host`] - Wire shapes exchanged with the host (requests, progress, archive handoff)
//! - [`session`] - Session cookie loading from browser cookie exports

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod host;
pub mod portal;
pub mod session;
pub mod sync;
mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, ArchiveError, ArchiveTree, FolderPath, PackagedArchive};
pub use host::{ArchiveHandoff, HostCommand, ProgressEvent, SyncRequest, SyncResponse};
pub use portal::{
    FileResponse, ListOutcome, NodeKind, Portal, PortalClient, PortalEndpoints, PortalError,
    RemoteNode,
};
pub use session::{
    SessionError, load_cookies_into_jar, load_session_cookie_jar, parse_netscape_cookies,
};
pub use sync::{
    AuthError, AuthOutcome, ChannelSink, ConnectionKind, ConnectionProfile, DEFAULT_MAX_IN_FLIGHT,
    FileStats, LogSink, NullSink, ProgressSink, RunSummary, SyncEngine, SyncError, SyncOptions,
};
