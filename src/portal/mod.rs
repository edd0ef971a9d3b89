//! Transport gateway for the course portal.
//!
//! The portal exposes three HTTP shapes that the sync engine needs:
//!
//! - form-encoded `POST` list calls (`action=list&code=<code>`) answering
//!   `{ "result": [ ... ] }`
//! - authenticated `GET` file downloads, which may redirect to the identity
//!   provider instead of returning bytes
//! - a form-encoded `POST` replaying the identity provider's login form
//!
//! [`Portal`] is the seam the engine talks through; [`PortalClient`] is the
//! reqwest implementation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use coursezip_core::portal::{Portal, PortalClient, PortalEndpoints};
//! use reqwest::cookie::Jar;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoints = PortalEndpoints::default();
//! let client = PortalClient::new(Arc::new(Jar::default()))?;
//! let listing = client.list(&endpoints.material_list_url, "").await?;
//! println!("root has {} entries", listing.nodes().len());
//! # Ok(())
//! # }
//! ```

mod client;
mod endpoints;
mod error;
pub mod login_form;
mod node;

pub use client::{CONNECT_TIMEOUT_SECS, PortalClient, READ_TIMEOUT_SECS};
pub use endpoints::{
    DROPBOX_LIST_URL, FILE_BASE_URL, IDENTITY_REDIRECT_URL, MATERIAL_LIST_URL, PortalEndpoints,
};
pub use error::PortalError;
pub use login_form::{LoginForm, LoginFormError};
pub use node::{NodeKind, RemoteNode};

pub(crate) use node::ListBody;

use async_trait::async_trait;
use url::Url;

/// Outcome of a list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    /// The call succeeded; children in portal order.
    Listed(Vec<RemoteNode>),
    /// The portal answered with a non-success status.
    Rejected {
        /// HTTP status code.
        status: u16,
    },
}

impl ListOutcome {
    /// Listed nodes, empty when the call was rejected.
    #[must_use]
    pub fn nodes(&self) -> &[RemoteNode] {
        match self {
            Self::Listed(nodes) => nodes,
            Self::Rejected { .. } => &[],
        }
    }
}

/// Response of a file download after redirects were followed.
#[derive(Debug, Clone)]
pub struct FileResponse {
    /// Final HTTP status code.
    pub status: u16,
    /// URL the request ended on.
    pub final_url: Url,
    /// Whether at least one redirect was followed.
    pub redirected: bool,
    /// Response body.
    pub body: Vec<u8>,
}

impl FileResponse {
    /// Returns true for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Operations the sync engine performs against the portal.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the engine can hold an
/// `Arc<dyn Portal>` and tests can substitute an in-memory portal.
#[async_trait]
pub trait Portal: Send + Sync {
    /// Lists the children of `code` through a connection profile's handler.
    async fn list(&self, list_url: &str, code: &str) -> Result<ListOutcome, PortalError>;

    /// Downloads the bytes of a file node.
    async fn fetch_file(&self, url: &str) -> Result<FileResponse, PortalError>;

    /// Posts a form-encoded body and returns the response status.
    async fn submit_form(&self, action: &str, fields: &[(&str, &str)])
    -> Result<u16, PortalError>;
}

/// Encodes `(name, value)` pairs as an `application/x-www-form-urlencoded` body.
#[must_use]
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_form_list_call() {
        assert_eq!(
            encode_form(&[("action", "list"), ("code", "")]),
            "action=list&code="
        );
    }

    #[test]
    fn test_encode_form_escapes_reserved_characters() {
        assert_eq!(
            encode_form(&[("RelayState", "cookie:1&2"), ("SAMLResponse", "PHM+Pg==")]),
            "RelayState=cookie%3A1%262&SAMLResponse=PHM%2BPg%3D%3D"
        );
    }

    #[test]
    fn test_rejected_listing_has_no_nodes() {
        let outcome = ListOutcome::Rejected { status: 500 };
        assert!(outcome.nodes().is_empty());
    }
}
