//! Netscape cookie export parsing.
//!
//! Browser extensions and `curl -c` export cookies as one TAB-separated line
//! per cookie: `domain`, `include_subdomains`, `path`, `secure`, `expires`,
//! `name`, `value`. `curl` marks HTTP-only cookies with a `#HttpOnly_`
//! domain prefix, which is accepted here.

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};

use super::SessionError;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One cookie of the exported session.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie domain, possibly with a leading dot.
    pub domain: String,
    /// Whether subdomains share the cookie.
    pub include_subdomains: bool,
    /// Path scope.
    pub path: String,
    /// Sent over HTTPS only.
    pub secure: bool,
    /// Marked HTTP-only by the exporter.
    pub http_only: bool,
    /// Unix expiry; 0 for a session cookie.
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl SessionCookie {
    /// Cookie value. Do not log it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `Set-Cookie` form of the cookie.
    fn set_cookie_header(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.expires > 0 {
            match http_date(self.expires) {
                Some(date) => {
                    header.push_str("; Expires=");
                    header.push_str(&date);
                }
                None => warn!(
                    name = %self.name,
                    expires = self.expires,
                    "cookie expiry out of range; keeping it for the session only"
                ),
            }
        }
        header
    }

    /// URL the cookie is attributed to when stored in the jar.
    fn origin(&self) -> Option<url::Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        format!("{scheme}://{host}{}", self.path).parse().ok()
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("http_only", &self.http_only)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Parsed export: the usable cookies plus the lines that were skipped.
#[derive(Debug, Default)]
pub struct CookieFile {
    /// Cookies in file order.
    pub cookies: Vec<SessionCookie>,
    /// `(line number, reason)` of every malformed line.
    pub skipped: Vec<(usize, String)>,
}

/// Parses a Netscape cookie export.
///
/// Comments and blank lines are ignored. Malformed lines are logged and
/// reported in [`CookieFile::skipped`].
///
/// # Errors
///
/// Returns [`SessionError::Read`] when the reader fails and
/// [`SessionError::NoCookies`] when the export has data lines but none of
/// them is a valid cookie.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<CookieFile, SessionError> {
    let mut file = CookieFile::default();
    let mut data_lines = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(SessionError::Read)?;
        let line = line.trim_end_matches(['\r', '\n']);

        let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(rest) => (rest, true),
            None => (line, false),
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        data_lines += 1;

        match parse_line(line, http_only) {
            Ok(cookie) => {
                debug!(line = line_number, domain = %cookie.domain, name = %cookie.name, "cookie parsed");
                file.cookies.push(cookie);
            }
            Err(reason) => {
                warn!(line = line_number, %reason, "skipping malformed cookie line");
                file.skipped.push((line_number, reason));
            }
        }
    }

    if file.cookies.is_empty() && data_lines > 0 {
        return Err(SessionError::NoCookies {
            skipped: file.skipped.len(),
        });
    }
    Ok(file)
}

fn parse_line(line: &str, http_only: bool) -> Result<SessionCookie, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, subdomains, path, secure, expires, name, value] = fields[..] else {
        return Err(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        ));
    };

    if domain.is_empty() {
        return Err("empty domain".to_string());
    }
    if name.is_empty() {
        return Err("empty cookie name".to_string());
    }
    let expires = expires
        .parse::<u64>()
        .map_err(|_| format!("expires must be a non-negative integer, got '{expires}'"))?;

    Ok(SessionCookie {
        domain: domain.to_string(),
        include_subdomains: parse_flag(subdomains, "include_subdomains")?,
        path: if path.is_empty() { "/" } else { path }.to_string(),
        secure: parse_flag(secure, "secure")?,
        http_only,
        expires,
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(raw: &str, field: &str) -> Result<bool, String> {
    if raw.eq_ignore_ascii_case("TRUE") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("FALSE") {
        Ok(false)
    } else {
        Err(format!("{field} must be TRUE or FALSE, got '{raw}'"))
    }
}

fn http_date(timestamp: u64) -> Option<String> {
    let time = std::time::UNIX_EPOCH.checked_add(std::time::Duration::from_secs(timestamp))?;
    Some(httpdate::fmt_http_date(time))
}

/// Stores cookies into a new jar shared by every request of the engine.
#[instrument(level = "debug", skip(cookies), fields(count = cookies.len()))]
pub fn load_cookies_into_jar(cookies: &[SessionCookie]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    for cookie in cookies {
        match cookie.origin() {
            Some(origin) => jar.add_cookie_str(&cookie.set_cookie_header(), &origin),
            None => warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with unusable domain"),
        }
    }
    jar
}
