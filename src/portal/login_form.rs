//! Parsing of the auto-submit login page served by the identity provider.
//!
//! The page carries a single `<form>` whose hidden inputs must be posted back
//! to the form's `action` to establish a session on the file host.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

/// Hidden input carrying the relay state.
pub const RELAY_STATE_FIELD: &str = "RelayState";

/// Hidden input carrying the signed assertion.
pub const SAML_RESPONSE_FIELD: &str = "SAMLResponse";

/// Matches `<form ...>` and `<input ...>` opening tags.
#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*(form|input)\b([^>]*)>").expect("tag regex is valid") // Static pattern, safe to panic
});

/// Matches `name=value` attribute pairs with double, single or no quotes.
#[allow(clippy::expect_used)]
static ATTRIBUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("attribute regex is valid") // Static pattern, safe to panic
});

/// Errors raised when the login page lacks what the replay needs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginFormError {
    /// No `<form>` with an `action` attribute was found.
    #[error("login page has no form action")]
    MissingAction,
    /// A required hidden field is absent.
    #[error("login page is missing the `{field}` field")]
    MissingField {
        /// Name of the absent input.
        field: &'static str,
    },
    /// The form action cannot be resolved against the page URL.
    #[error("login form action `{action}` is not a valid URL")]
    InvalidAction {
        /// The action as found in the page.
        action: String,
    },
}

/// Login form extracted from the identity provider page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Decoded form action URL.
    pub action: String,
    /// Decoded `name -> value` of every input in the page.
    pub fields: HashMap<String, String>,
}

impl LoginForm {
    /// Parses the page into a form action and a field map.
    ///
    /// Attribute values are HTML-entity decoded. Attribute order, quoting
    /// style and whitespace between tokens do not matter.
    ///
    /// # Errors
    ///
    /// Returns [`LoginFormError::MissingAction`] when no form action exists.
    #[instrument(level = "debug", skip(html), fields(len = html.len()))]
    pub fn parse(html: &str) -> Result<Self, LoginFormError> {
        let mut action = None;
        let mut fields = HashMap::new();

        for tag in TAG_PATTERN.captures_iter(html) {
            let attributes = parse_attributes(&tag[2]);
            if tag[1].eq_ignore_ascii_case("form") {
                if action.is_none() {
                    action = attributes.get("action").cloned();
                }
            } else if let Some(name) = attributes.get("name") {
                let value = attributes.get("value").cloned().unwrap_or_default();
                fields.insert(name.clone(), value);
            }
        }

        let action = action
            .filter(|value| !value.is_empty())
            .ok_or(LoginFormError::MissingAction)?;
        debug!(fields = fields.len(), "parsed login form");
        Ok(Self { action, fields })
    }

    /// Returns the value of a required field.
    ///
    /// # Errors
    ///
    /// Returns [`LoginFormError::MissingField`] when the field is absent.
    pub fn require(&self, field: &'static str) -> Result<&str, LoginFormError> {
        self.fields
            .get(field)
            .map(String::as_str)
            .ok_or(LoginFormError::MissingField { field })
    }

    /// Returns the `(name, value)` pairs posted back to the action.
    ///
    /// # Errors
    ///
    /// Returns [`LoginFormError::MissingField`] when `RelayState` or
    /// `SAMLResponse` is absent.
    pub fn replay_fields(&self) -> Result<[(&'static str, &str); 2], LoginFormError> {
        Ok([
            (RELAY_STATE_FIELD, self.require(RELAY_STATE_FIELD)?),
            (SAML_RESPONSE_FIELD, self.require(SAML_RESPONSE_FIELD)?),
        ])
    }
}

/// Lower-cased attribute names mapped to decoded values.
fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE_PATTERN
        .captures_iter(raw)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            (
                caps[1].to_ascii_lowercase(),
                html_escape::decode_html_entities(value).into_owned(),
            )
        })
        .collect()
}
