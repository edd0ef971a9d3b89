//! Portal session cookies.
//!
//! The sync engine is authenticated by the cookies of an existing browser
//! session, exported in Netscape format. They are loaded into one
//! [`reqwest::cookie::Jar`] that every request shares, so cookies set by the
//! login replay are reused for the rest of the run.

mod cookies;

pub use cookies::{CookieFile, SessionCookie, load_cookies_into_jar, parse_netscape_cookies};

use std::collections::HashSet;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::cookie::Jar;
use thiserror::Error;
use tracing::{info, instrument};

/// Errors raised while loading session cookies.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The cookie file could not be opened.
    #[error("cannot open cookie file '{path}': {source}")]
    Open {
        /// Path given on the command line or in the config.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading the export failed midway.
    #[error("failed to read cookie file: {0}")]
    Read(#[source] io::Error),

    /// The export has data lines but no usable cookie.
    #[error("no valid cookies found ({skipped} lines failed to parse)")]
    NoCookies {
        /// Number of malformed lines.
        skipped: usize,
    },
}

/// Builds the session jar from a cookie export.
///
/// `source` is a file path, `-` for stdin, or `None` for an empty jar (the
/// portal then has to accept the requests anonymously).
///
/// # Errors
///
/// Returns [`SessionError`] when the export cannot be read or holds no valid
/// cookie.
#[instrument(level = "debug")]
pub fn load_session_cookie_jar(source: Option<&str>) -> Result<Arc<Jar>, SessionError> {
    let Some(source) = source else {
        info!("no cookie file given; starting without a portal session");
        return Ok(Arc::new(Jar::default()));
    };

    let reader: Box<dyn BufRead> = if source == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = std::fs::File::open(source).map_err(|source_err| SessionError::Open {
            path: PathBuf::from(source),
            source: source_err,
        })?;
        Box::new(BufReader::new(file))
    };

    let file = parse_netscape_cookies(reader)?;
    let domains: HashSet<&str> = file.cookies.iter().map(|c| c.domain.as_str()).collect();
    info!(
        cookies = file.cookies.len(),
        domains = domains.len(),
        skipped = file.skipped.len(),
        "session cookies loaded"
    );
    Ok(load_cookies_into_jar(&file.cookies))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use reqwest::cookie::CookieStore;

    use super::*;

    #[test]
    fn test_no_source_gives_empty_jar() {
        let jar = load_session_cookie_jar(None).unwrap();
        let url = url::Url::parse("https://didattica.polito.it/").unwrap();
        assert!(jar.cookies(&url).is_none());
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let error = load_session_cookie_jar(Some("/nonexistent/cookies.txt")).unwrap_err();
        assert!(matches!(error, SessionError::Open { .. }));
        assert!(error.to_string().contains("/nonexistent/cookies.txt"));
    }

    #[test]
    fn test_file_source_populates_jar() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ".polito.it\tTRUE\t/\tTRUE\t0\tsession\tvalue").unwrap();

        let jar = load_session_cookie_jar(file.path().to_str()).unwrap();
        let url = url::Url::parse("https://didattica.polito.it/pls/").unwrap();
        assert_eq!(jar.cookies(&url).unwrap().to_str().unwrap(), "session=value");
    }

    #[test]
    fn test_file_without_cookies_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not a cookie export").unwrap();

        let error = load_session_cookie_jar(file.path().to_str()).unwrap_err();
        assert!(matches!(error, SessionError::NoCookies { skipped: 1 }));
    }
}
