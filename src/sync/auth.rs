//! Session authenticator.
//!
//! The file host does not share the portal's session. When the session is
//! missing, downloading any file redirects to the identity provider, whose
//! page holds an auto-submitting form. Posting that form back establishes the
//! session for every later download of the run.
//!
//! Whether a login is needed is decided from the first listed item of the
//! root directory only. A root whose first entry is a link or a directory
//! can therefore misreport the session state; this is a known limitation.

use tracing::{debug, info, instrument, warn};

use super::connection::ConnectionProfile;
use super::context::RunContext;
use super::error::{AuthError, SyncError};
use crate::portal::{ListOutcome, LoginForm, LoginFormError, Portal, PortalEndpoints, PortalError};

/// What the authenticator found (and did).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The root is empty; nothing to download, nothing to check.
    EmptyRoot,
    /// The first download did not hit the identity provider.
    SessionValid,
    /// The login form was replayed and accepted.
    Replayed,
}

/// Validates the session, replaying the identity provider's login form at
/// most once when a download redirects there.
///
/// # Errors
///
/// Returns [`AuthError::ProbeRejected`] when the root listing fails,
/// [`AuthError::LoginForm`] when the login page lacks the action,
/// `RelayState` or `SAMLResponse`, [`AuthError::ReplayRejected`] when the
/// replay is refused, and [`AuthError::Transport`] when one of its requests
/// cannot be completed.
#[instrument(level = "debug", skip_all, fields(run = run.id(), root = root_code))]
pub async fn ensure_authenticated(
    portal: &dyn Portal,
    endpoints: &PortalEndpoints,
    profile: &ConnectionProfile,
    root_code: &str,
    run: &RunContext,
) -> Result<AuthOutcome, SyncError> {
    let listing = run
        .guarded(async {
            portal
                .list(profile.list_url(), root_code)
                .await
                .map_err(login_failure)
        })
        .await?;

    let nodes = match listing {
        ListOutcome::Listed(nodes) => nodes,
        ListOutcome::Rejected { status } => {
            return Err(AuthError::ProbeRejected { status }.into());
        }
    };

    let Some(first) = nodes.first() else {
        debug!("root directory is empty; skipping session check");
        return Ok(AuthOutcome::EmptyRoot);
    };

    let probe_url = endpoints.file_url(profile.code(), &first.code);
    let response = run
        .guarded(async { portal.fetch_file(&probe_url).await.map_err(login_failure) })
        .await?;

    if !response.redirected || !endpoints.is_identity_redirect(&response.final_url) {
        debug!(status = response.status, "session already valid");
        return Ok(AuthOutcome::SessionValid);
    }

    info!("session missing; replaying identity provider login");
    let page = String::from_utf8_lossy(&response.body);
    let form = LoginForm::parse(&page).map_err(AuthError::from)?;
    let fields = form.replay_fields().map_err(AuthError::from)?;
    // Relative actions point at the identity provider host.
    let action = response
        .final_url
        .join(&form.action)
        .map_err(|_| LoginFormError::InvalidAction {
            action: form.action.clone(),
        })
        .map_err(AuthError::from)?;

    let status = run
        .guarded(async {
            portal
                .submit_form(action.as_str(), &fields)
                .await
                .map_err(login_failure)
        })
        .await?;

    if !(200..300).contains(&status) {
        warn!(status, "login replay rejected");
        return Err(AuthError::ReplayRejected { status }.into());
    }

    info!("session established");
    Ok(AuthOutcome::Replayed)
}

fn login_failure(error: PortalError) -> SyncError {
    AuthError::from(error).into()
}
