//! Blocking HTTP session with optional cookie authentication and a politeness delay between requests.

use super::cookies::{install_cookies, load_cookie_file};
use super::{ApiError, HttpResponse, Query, Transport};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Safari/537.36";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_MS: u64 = 500;
const MAX_REDIRECTS: usize = 10;

/// Outcome of loading the cookie file. `authenticated` iff at least one cookie was installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub cookie_count: usize,
    /// Why authentication is off, when it is.
    pub diagnostic: Option<String>,
}

impl AuthStatus {
    fn unauthenticated(diagnostic: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            cookie_count: 0,
            diagnostic: Some(diagnostic.into()),
        }
    }
}

/// Reusable blocking client. Cookies from the cookie file ride along on every request.
#[derive(Debug)]
pub struct Session {
    inner: reqwest::blocking::Client,
    auth: AuthStatus,
    cookies_path: Option<PathBuf>,
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Session {
    /// Unauthenticated session with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    /// Session authenticated from a cookie file. A missing or invalid file yields an unauthenticated session.
    pub fn with_cookies(path: impl Into<PathBuf>) -> Result<Self, ApiError> {
        Self::builder().cookies_path(path).build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn auth_status(&self) -> &AuthStatus {
        &self.auth
    }

    pub fn cookies_path(&self) -> Option<&Path> {
        self.cookies_path.as_deref()
    }

    fn wait_delay(&self) {
        let last = *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }

    fn mark_request(&self) {
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn send(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<HttpResponse, ApiError> {
        self.wait_delay();
        let result = request.send();
        self.mark_request();
        let response = result.map_err(|e| ApiError::Network {
            url: url.to_string(),
            source: e,
        })?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().map_err(|e| ApiError::Network {
            url: url.to_string(),
            source: e,
        })?;
        debug!(url, status, final_url = %final_url, "response");
        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

impl Transport for Session {
    fn get(&self, url: &str, query: &Query) -> Result<HttpResponse, ApiError> {
        self.send(url, self.inner.get(url).query(query))
    }

    fn post(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, ApiError> {
        self.send(url, self.inner.post(url).json(body))
    }

    fn is_authenticated(&self) -> bool {
        self.auth.authenticated
    }
}

/// Builder for [Session]: cookie file, User-Agent, timeout, and delay between requests.
#[derive(Debug)]
pub struct SessionBuilder {
    cookies_path: Option<PathBuf>,
    user_agent: Option<String>,
    timeout_secs: u64,
    delay_ms: u64,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            cookies_path: None,
            user_agent: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl SessionBuilder {
    /// JSON cookie file to authenticate with.
    pub fn cookies_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_path = Some(path.into());
        self
    }

    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set minimum delay between consecutive requests in milliseconds. Default 500.
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Load cookies (never fails on a bad cookie file) and build the blocking client.
    pub fn build(self) -> Result<Session, ApiError> {
        let jar = Arc::new(Jar::default());
        let auth = match self.cookies_path.as_deref() {
            None => AuthStatus::unauthenticated("no cookie file configured"),
            Some(path) => match load_cookie_file(path) {
                Ok(cookies) => {
                    let installed = install_cookies(&jar, &cookies);
                    if installed == 0 {
                        warn!(path = %path.display(), "cookie file has no usable cookies; continuing unauthenticated");
                        AuthStatus::unauthenticated(format!(
                            "no usable cookies in {}",
                            path.display()
                        ))
                    } else {
                        debug!(path = %path.display(), installed, "authenticated from cookie file");
                        AuthStatus {
                            authenticated: true,
                            cookie_count: installed,
                            diagnostic: None,
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to load cookies; continuing unauthenticated");
                    AuthStatus::unauthenticated(e.to_string())
                }
            },
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_provider(jar)
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ApiError::Client { source: e })?;

        Ok(Session {
            inner,
            auth,
            cookies_path: self.cookies_path,
            delay: Duration::from_millis(self.delay_ms),
            last_request: Mutex::new(None),
        })
    }
}
