//! JSON cookie file parser and reqwest jar loader.
//!
//! The file is a JSON array of `{name, value, domain, path, secure}` objects, as exported by
//! browser cookie extensions or a Selenium session.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_COOKIE_DOMAIN: &str = ".substack.com";

/// One cookie record from the cookie file.
#[derive(Clone, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    value: String,
    /// Defaults to `.substack.com` when absent.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: default_path(),
            secure: false,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Cookie value. Sensitive; do not log.
    pub fn value(&self) -> &str {
        &self.value
    }

    fn domain_or_default(&self) -> &str {
        match self.domain.as_deref() {
            Some(d) if !d.is_empty() => d,
            _ => DEFAULT_COOKIE_DOMAIN,
        }
    }

    /// Why this record cannot become a well-formed `Set-Cookie`, if it cannot.
    fn rejection(&self) -> Option<&'static str> {
        if self.name.is_empty() {
            Some("empty name")
        } else if self
            .name
            .chars()
            .any(|c| c == ';' || c == '=' || c == ',' || c.is_whitespace() || c.is_control())
        {
            Some("name contains a separator")
        } else if self.value.chars().any(|c| c == ';' || c.is_control()) {
            Some("value contains a separator")
        } else if !self.path.starts_with('/') {
            Some("path must start with '/'")
        } else if self.domain_or_default().contains(|c| c == ':' || c == '/') {
            Some("domain must be a bare host")
        } else {
            None
        }
    }

    fn set_cookie_header(&self) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, self.value),
            format!("Domain={}", self.domain_or_default()),
            format!("Path={}", self.path),
        ];
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }

    fn origin_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let domain = self.domain_or_default();
        let host = domain.strip_prefix('.').unwrap_or(domain);
        format!("{}://{}{}", scheme, host, self.path)
    }
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Why a cookie file could not be used. Never escapes [Session](super::Session) construction.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("Cannot read cookie file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid cookie file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cookie file {} contains no cookies", path.display())]
    Empty { path: PathBuf },
}

/// Parse cookie file contents: a JSON array of cookie records.
pub fn parse_cookies(s: &str) -> Result<Vec<CookieRecord>, serde_json::Error> {
    serde_json::from_str(s)
}

/// Read and parse a cookie file. An empty array is [CookieError::Empty].
pub fn load_cookie_file(path: &Path) -> Result<Vec<CookieRecord>, CookieError> {
    let s = std::fs::read_to_string(path).map_err(|e| CookieError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let cookies = parse_cookies(&s).map_err(|e| CookieError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    if cookies.is_empty() {
        return Err(CookieError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(cookies)
}

/// Add each cookie to `jar`. Returns how many the jar accepted; malformed or unroutable records are
/// skipped with a warning.
pub fn install_cookies(jar: &Jar, cookies: &[CookieRecord]) -> usize {
    let mut installed = 0;
    for cookie in cookies {
        if let Some(reason) = cookie.rejection() {
            warn!(name = %cookie.name, domain = %cookie.domain_or_default(), reason, "skipping cookie");
            continue;
        }
        let url = match Url::parse(&cookie.origin_url()) {
            Ok(url) => url,
            Err(e) => {
                warn!(name = %cookie.name, domain = %cookie.domain_or_default(), error = %e, "skipping cookie with unparseable domain");
                continue;
            }
        };
        jar.add_cookie_str(&cookie.set_cookie_header(), &url);
        if jar_sends(jar, &url, &cookie.name) {
            debug!(name = %cookie.name, domain = %cookie.domain_or_default(), "loaded cookie into jar");
            installed += 1;
        } else {
            warn!(name = %cookie.name, domain = %cookie.domain_or_default(), "cookie jar rejected cookie");
        }
    }
    installed
}

/// Whether the jar would send a cookie called `name` to `url`.
fn jar_sends(jar: &Jar, url: &Url, name: &str) -> bool {
    let Some(header) = jar.cookies(url) else {
        return false;
    };
    let Ok(header) = header.to_str() else {
        return false;
    };
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(n, _)| n == name)
}
