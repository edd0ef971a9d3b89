//! reqwest implementation of the [`Portal`] gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument, trace};
use url::Url;

use super::error::PortalError;
use super::{FileResponse, ListBody, ListOutcome, Portal, encode_form};
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// HTTP client for the portal.
///
/// Every request shares one cookie jar, so a session established by the
/// login replay is reused by every later listing and download. The client is
/// cheap to clone and is meant to be created once per process.
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: Client,
}

impl PortalClient {
    /// Creates a client with default timeouts over the given cookie jar.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::ClientBuild`] when reqwest rejects the configuration.
    pub fn new(cookie_jar: Arc<Jar>) -> Result<Self, PortalError> {
        Self::with_timeouts(cookie_jar, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::ClientBuild`] when reqwest rejects the configuration.
    #[instrument(level = "debug", skip(cookie_jar))]
    pub fn with_timeouts(
        cookie_jar: Arc<Jar>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, PortalError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .cookie_provider(cookie_jar)
            .build()
            .map_err(PortalError::ClientBuild)?;
        Ok(Self { client })
    }

    async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Response, PortalError> {
        Url::parse(url).map_err(|_| PortalError::invalid_url(url))?;
        self.client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(encode_form(fields))
            .send()
            .await
            .map_err(|e| PortalError::from_request(url, e))
    }
}

#[async_trait]
impl Portal for PortalClient {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, list_url: &str, code: &str) -> Result<ListOutcome, PortalError> {
        let response = self
            .post_form(list_url, &[("action", "list"), ("code", code)])
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "listing rejected");
            return Ok(ListOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PortalError::from_request(list_url, e))?;
        let parsed: ListBody =
            serde_json::from_slice(&body).map_err(|e| PortalError::invalid_body(list_url, e))?;
        trace!(entries = parsed.result.len(), "listing parsed");
        Ok(ListOutcome::Listed(parsed.result))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_file(&self, url: &str) -> Result<FileResponse, PortalError> {
        let requested = Url::parse(url).map_err(|_| PortalError::invalid_url(url))?;
        let response = self
            .client
            .get(requested.clone())
            .send()
            .await
            .map_err(|e| PortalError::from_request(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let redirected = final_url != requested;
        let body = response
            .bytes()
            .await
            .map_err(|e| PortalError::from_request(url, e))?
            .to_vec();

        debug!(
            status,
            redirected,
            final_url = %final_url,
            bytes = body.len(),
            "file response received"
        );
        Ok(FileResponse {
            status,
            final_url,
            redirected,
            body,
        })
    }

    #[instrument(level = "debug", skip(self, fields), fields(field_count = fields.len()))]
    async fn submit_form(
        &self,
        action: &str,
        fields: &[(&str, &str)],
    ) -> Result<u16, PortalError> {
        let response = self.post_form(action, fields).await?;
        Ok(response.status().as_u16())
    }
}
