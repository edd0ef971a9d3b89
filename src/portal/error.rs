//! Error types for the portal transport gateway.
//!
//! Only transport-level failures live here. A non-success HTTP status is a
//! normal outcome for the gateway and is reported to the caller, which
//! decides what it means for the current phase.

use thiserror::Error;

/// Errors raised while talking to the portal.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A listing answered with a body that is not the expected JSON shape.
    #[error("unexpected listing body from {url}: {source}")]
    InvalidBody {
        /// The listing URL.
        url: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl PortalError {
    /// Classifies a reqwest error as a timeout or a generic network error.
    pub fn from_request(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a listing decode error.
    pub fn invalid_body(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidBody {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
