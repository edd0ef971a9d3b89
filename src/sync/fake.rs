//! In-memory [`Portal`] used by the engine unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::portal::{FileResponse, ListOutcome, Portal, PortalError, RemoteNode};

/// One recorded portal interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List { list_url: String, code: String },
    FetchStart(String),
    FetchEnd(String),
    Submit { action: String, fields: Vec<(String, String)> },
}

#[derive(Default)]
pub(crate) struct FakePortal {
    listings: HashMap<(String, String), ListOutcome>,
    files: HashMap<String, FileResponse>,
    submit_status: Option<u16>,
    submit_fails: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakePortal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_listing(mut self, list_url: &str, code: &str, nodes: Vec<RemoteNode>) -> Self {
        self.listings.insert(
            (list_url.to_string(), code.to_string()),
            ListOutcome::Listed(nodes),
        );
        self
    }

    pub(crate) fn with_rejected_listing(mut self, list_url: &str, code: &str, status: u16) -> Self {
        self.listings.insert(
            (list_url.to_string(), code.to_string()),
            ListOutcome::Rejected { status },
        );
        self
    }

    pub(crate) fn with_file(self, url: &str, body: Vec<u8>) -> Self {
        self.with_file_response(url, 200, url, body)
    }

    pub(crate) fn with_redirect(self, url: &str, final_url: &str, body: Vec<u8>) -> Self {
        self.with_file_response(url, 200, final_url, body)
    }

    pub(crate) fn with_file_response(
        mut self,
        url: &str,
        status: u16,
        final_url: &str,
        body: Vec<u8>,
    ) -> Self {
        self.files.insert(
            url.to_string(),
            FileResponse {
                status,
                final_url: Url::parse(final_url).unwrap(),
                redirected: url != final_url,
                body,
            },
        );
        self
    }

    pub(crate) fn with_submit_status(mut self, status: u16) -> Self {
        self.submit_status = Some(status);
        self
    }

    /// Makes the login replay fail before any status is received.
    pub(crate) fn with_failing_submit(mut self) -> Self {
        self.submit_fails = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn list_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::List { list_url, code } => Some((list_url, code)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn fetch_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FetchStart(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn submit_calls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit { action, fields } => Some((action, fields)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn list(&self, list_url: &str, code: &str) -> Result<ListOutcome, PortalError> {
        self.record(Call::List {
            list_url: list_url.to_string(),
            code: code.to_string(),
        });
        tokio::task::yield_now().await;
        Ok(self
            .listings
            .get(&(list_url.to_string(), code.to_string()))
            .cloned()
            .unwrap_or(ListOutcome::Rejected { status: 404 }))
    }

    async fn fetch_file(&self, url: &str) -> Result<FileResponse, PortalError> {
        self.record(Call::FetchStart(url.to_string()));
        tokio::task::yield_now().await;
        let response = match self.files.get(url) {
            Some(response) => response.clone(),
            None => FileResponse {
                status: 404,
                final_url: Url::parse(url).map_err(|_| PortalError::invalid_url(url))?,
                redirected: false,
                body: Vec::new(),
            },
        };
        self.record(Call::FetchEnd(url.to_string()));
        Ok(response)
    }

    async fn submit_form(&self, action: &str, fields: &[(&str, &str)]) -> Result<u16, PortalError> {
        self.record(Call::Submit {
            action: action.to_string(),
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        });
        if self.submit_fails {
            return Err(PortalError::Timeout {
                url: action.to_string(),
            });
        }
        Ok(self.submit_status.unwrap_or(200))
    }
}

/// Builds an identity provider auto-submit page; `None` omits the input.
pub(crate) fn idp_page(action: &str, relay_state: Option<&str>, saml: Option<&str>) -> String {
    let mut inputs = String::new();
    if let Some(value) = relay_state {
        inputs.push_str(&format!(
            "<input type=\"hidden\" name=\"RelayState\" value=\"{value}\"/>\n"
        ));
    }
    if let Some(value) = saml {
        inputs.push_str(&format!(
            "<input type=\"hidden\" name=\"SAMLResponse\" value=\"{value}\"/>\n"
        ));
    }
    format!(
        "<html><body onload=\"document.forms[0].submit()\">\n<form action=\"{action}\" method=\"post\">\n{inputs}</form></body></html>"
    )
}
