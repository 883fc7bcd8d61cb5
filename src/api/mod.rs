//! Request layer: transport boundary, cookie session, per-entity cache, pagination, and handle redirects.

mod cache;
mod client;
mod cookies;
mod error;
mod paginate;
mod redirect;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::EntityCache;
pub use client::{AuthStatus, Session, SessionBuilder};
pub use cookies::{install_cookies, load_cookie_file, parse_cookies, CookieError, CookieRecord};
pub use error::ApiError;
pub use paginate::{Listing, Page, PageStyle, Paginator};
pub use redirect::{lookup_with_redirect, resolve_handle_redirect, Resolution};

use serde::de::DeserializeOwned;
use tracing::debug;

/// Query parameters as sent on the wire, in insertion order.
pub type Query = [(String, String)];

/// Status, final URL (after redirects), and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. `url` is the requested URL, used for error context.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

/// HTTP boundary used by every entity. [Session] is the production implementation.
///
/// Non-2xx responses are returned as `Ok`; only transport failures are `Err`.
/// Callers that want status errors go through [fetch_json].
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, query: &Query) -> Result<HttpResponse, ApiError>;

    fn post(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, ApiError>;

    /// Whether requests carry session cookies.
    fn is_authenticated(&self) -> bool {
        false
    }
}

/// Turn a non-2xx response into [ApiError::HttpStatus] against the requested URL.
pub fn check_response(response: HttpResponse, url: &str) -> Result<HttpResponse, ApiError> {
    if !response.is_success() {
        return Err(ApiError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        });
    }
    Ok(response)
}

/// GET `url` with `query`, require a 2xx status, and decode the JSON body.
pub fn fetch_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    url: &str,
    query: &Query,
) -> Result<T, ApiError> {
    debug!(url, ?query, "GET");
    let response = transport.get(url, query)?;
    check_response(response, url)?.json(url)
}
