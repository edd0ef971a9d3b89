//! Portal endpoint locations.

use url::Url;

/// List handler for course material folders.
pub const MATERIAL_LIST_URL: &str =
    "https://didattica.polito.it/pls/portal30/sviluppo.filemgr.handler";

/// List handler for dropbox folders.
pub const DROPBOX_LIST_URL: &str =
    "https://didattica.polito.it/pls/portal30/sviluppo.filemgr_dropbox_1.handler";

/// Base of the file host serving `/download/<profile>/<code>`.
pub const FILE_BASE_URL: &str = "https://file.didattica.polito.it";

/// Page the file host redirects to when the session is not established.
pub const IDENTITY_REDIRECT_URL: &str = "https://idp.polito.it/idp/profile/SAML2/Redirect/SSO";

/// Where the portal's endpoints live.
///
/// Defaults point at the production portal. Overrides exist so a config file
/// (or a test) can point the engine somewhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEndpoints {
    /// List handler of the material connection profile.
    pub material_list_url: String,
    /// List handler of the dropbox connection profile.
    pub dropbox_list_url: String,
    /// File host base URL, without trailing slash.
    pub file_base_url: String,
    /// Identity-provider page that signals a missing session.
    pub identity_redirect_url: String,
}

impl Default for PortalEndpoints {
    fn default() -> Self {
        Self {
            material_list_url: MATERIAL_LIST_URL.to_string(),
            dropbox_list_url: DROPBOX_LIST_URL.to_string(),
            file_base_url: FILE_BASE_URL.to_string(),
            identity_redirect_url: IDENTITY_REDIRECT_URL.to_string(),
        }
    }
}

impl PortalEndpoints {
    /// Lays every endpoint out under a single base URL, keeping the
    /// production paths. Used to point the engine at a mock server.
    #[must_use]
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            material_list_url: format!("{base}/pls/portal30/sviluppo.filemgr.handler"),
            dropbox_list_url: format!("{base}/pls/portal30/sviluppo.filemgr_dropbox_1.handler"),
            file_base_url: base.to_string(),
            identity_redirect_url: format!("{base}/idp/profile/SAML2/Redirect/SSO"),
        }
    }

    /// Download URL of a file node under a connection profile.
    #[must_use]
    pub fn file_url(&self, profile_code: &str, node_code: &str) -> String {
        format!(
            "{}/download/{}/{}?download",
            self.file_base_url.trim_end_matches('/'),
            urlencoding::encode(profile_code),
            urlencoding::encode(node_code)
        )
    }

    /// Returns true when `final_url` landed on the identity-provider page.
    ///
    /// Scheme, host, port and path must match; query and fragment are ignored
    /// because the provider appends per-request parameters.
    #[must_use]
    pub fn is_identity_redirect(&self, final_url: &Url) -> bool {
        let Ok(target) = Url::parse(&self.identity_redirect_url) else {
            return false;
        };
        final_url.scheme() == target.scheme()
            && final_url.host_str() == target.host_str()
            && final_url.port_or_known_default() == target.port_or_known_default()
            && final_url.path().trim_end_matches('/') == target.path().trim_end_matches('/')
    }
}
