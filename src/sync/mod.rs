//! Recursive directory-sync engine.
//!
//! A run goes through four phases, each of which may abort it:
//!
//! 1. **Connection** - probe which list handler serves the course
//! 2. **Session** - make sure file downloads are authenticated, replaying
//!    the identity provider's login form when they are not
//! 3. **Count** - walk the tree once to add up the declared file sizes
//! 4. **Download** - walk it again, fetching every file into the archive
//!
//! The finished archive is packaged and kept by [`SyncEngine`] until the
//! host pulls it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coursezip_core::portal::{PortalClient, PortalEndpoints};
//! use coursezip_core::sync::{LogSink, SyncEngine};
//! use coursezip_core::{HostCommand, SyncRequest};
//! use reqwest::cookie::Jar;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let portal = PortalClient::new(Arc::new(Jar::default()))?;
//! let engine = SyncEngine::new(Arc::new(portal), PortalEndpoints::default(), Arc::new(LogSink));
//!
//! let reply = engine.handle(SyncRequest::new("123456", "Analisi I")).await;
//! if reply.ok {
//!     let archive = engine.handle_command(HostCommand::GetZipBlob);
//!     println!("{:?}", archive.map(|a| a.blob.len()));
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod connection;
mod context;
mod engine;
mod error;
mod progress;
mod walker;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fake;

pub use auth::{AuthOutcome, ensure_authenticated};
pub use connection::{ConnectionKind, ConnectionProfile, resolve_connection};
pub use context::RunContext;
pub use engine::{DEFAULT_MAX_IN_FLIGHT, RunSummary, SyncEngine, SyncOptions};
pub use error::{AuthError, SyncError};
pub use progress::{ChannelSink, FileStats, LogSink, NullSink, ProgressAggregator, ProgressSink};
