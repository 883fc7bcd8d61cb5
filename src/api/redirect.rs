//! Renamed-handle recovery: a 404 on a profile lookup triggers one check of the `@handle` page,
//! whose redirect target names the current handle.

use super::{ApiError, Transport};
use reqwest::Url;
use tracing::{debug, info};

const HANDLE_PAGE_BASE: &str = "https://substack.com/@";

/// Value from a lookup, and the new handle if it was only found after a redirect.
#[derive(Debug)]
pub struct Resolution<T> {
    pub value: T,
    pub redirected_to: Option<String>,
}

/// Extract the handle from a `https://substack.com/@handle[/...]` URL.
fn handle_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let first = parsed.path_segments()?.find(|s| !s.is_empty())?;
    let handle = first.strip_prefix('@')?;
    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}

/// Ask Substack where `handle` lives now. `None` when the page errors, does not land on an
/// `@handle` URL, or lands on the same handle.
pub fn resolve_handle_redirect(transport: &dyn Transport, handle: &str) -> Option<String> {
    let url = format!("{}{}", HANDLE_PAGE_BASE, handle);
    let response = match transport.get(&url, &[]) {
        Ok(r) => r,
        Err(e) => {
            debug!(handle, error = %e, "handle redirect lookup failed");
            return None;
        }
    };
    if !response.is_success() {
        debug!(handle, status = response.status, "handle page did not resolve");
        return None;
    }
    match handle_from_url(&response.url) {
        Some(new_handle) if new_handle != handle => Some(new_handle),
        _ => {
            debug!(handle, final_url = %response.url, "no handle redirect");
            None
        }
    }
}

/// Run `lookup(handle)`; on a 404 with `follow_redirects`, retry once under the redirected handle.
///
/// Any failure after the first 404 surfaces that original 404.
pub fn lookup_with_redirect<T, F>(
    transport: &dyn Transport,
    handle: &str,
    follow_redirects: bool,
    lookup: F,
) -> Result<Resolution<T>, ApiError>
where
    F: Fn(&str) -> Result<T, ApiError>,
{
    let original_err = match lookup(handle) {
        Ok(value) => {
            return Ok(Resolution {
                value,
                redirected_to: None,
            })
        }
        Err(e) if follow_redirects && e.is_not_found() => e,
        Err(e) => return Err(e),
    };
    let Some(new_handle) = resolve_handle_redirect(transport, handle) else {
        return Err(original_err);
    };
    match lookup(&new_handle) {
        Ok(value) => {
            info!(from = handle, to = %new_handle, "followed handle redirect");
            Ok(Resolution {
                value,
                redirected_to: Some(new_handle),
            })
        }
        Err(e) => {
            debug!(to = %new_handle, error = %e, "lookup under redirected handle failed");
            Err(original_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{redirected_response, status_response, FakeTransport};

    fn profile(handle: &str) -> String {
        format!("https://substack.com/api/v1/user/{}/public_profile", handle)
    }

    /// Lookup that succeeds only for `live`, and 404s otherwise, going through `transport`.
    fn lookup<'a>(
        transport: &'a FakeTransport,
    ) -> impl Fn(&str) -> Result<String, ApiError> + 'a {
        move |h: &str| {
            let url = profile(h);
            let response = transport.get(&url, &[])?;
            crate::api::check_response(response, &url).map(|_| h.to_string())
        }
    }

    fn routed(final_handle_url: &'static str, live: &'static str) -> FakeTransport {
        FakeTransport::new(move |url, _| {
            if url.starts_with(HANDLE_PAGE_BASE) {
                redirected_response(final_handle_url)
            } else if url == profile(live) {
                status_response(url, 200)
            } else {
                status_response(url, 404)
            }
        })
    }

    #[test]
    fn handle_from_url_reads_first_segment() {
        assert_eq!(
            handle_from_url("https://substack.com/@newhandle"),
            Some("newhandle".to_string())
        );
        assert_eq!(
            handle_from_url("https://substack.com/@newhandle/posts"),
            Some("newhandle".to_string())
        );
        assert_eq!(handle_from_url("https://substack.com/error"), None);
        assert_eq!(handle_from_url("https://substack.com/@"), None);
        assert_eq!(handle_from_url("not a url"), None);
    }

    #[test]
    fn redirect_followed_to_new_handle() -> Result<(), ApiError> {
        let fake = routed("https://substack.com/@newhandle", "newhandle");
        let resolution = lookup_with_redirect(&fake, "oldhandle", true, lookup(&fake))?;
        assert_eq!(resolution.value, "newhandle");
        assert_eq!(resolution.redirected_to.as_deref(), Some("newhandle"));
        assert_eq!(fake.call_count(), 3);
        Ok(())
    }

    #[test]
    fn no_follow_surfaces_original_404() {
        let fake = routed("https://substack.com/@newhandle", "newhandle");
        let result = lookup_with_redirect(&fake, "oldhandle", false, lookup(&fake));
        assert!(result.err().is_some_and(|e| e.is_not_found()));
        assert_eq!(fake.call_count(), 1);
    }

    #[test]
    fn redirect_to_same_handle_surfaces_404() {
        let fake = routed("https://substack.com/@oldhandle", "nobody");
        let result = lookup_with_redirect(&fake, "oldhandle", true, lookup(&fake));
        assert!(result.err().is_some_and(|e| e.is_not_found()));
        assert_eq!(fake.call_count(), 2);
    }

    #[test]
    fn redirect_to_non_handle_page_surfaces_404() {
        let fake = routed("https://substack.com/error", "nobody");
        let result = lookup_with_redirect(&fake, "oldhandle", true, lookup(&fake));
        assert!(result.err().is_some_and(|e| e.is_not_found()));
    }

    #[test]
    fn retry_failure_surfaces_original_404() -> Result<(), String> {
        let fake = routed("https://substack.com/@newhandle", "nobody");
        let result = lookup_with_redirect(&fake, "oldhandle", true, lookup(&fake));
        assert_eq!(fake.call_count(), 3);
        match &result {
            Err(ApiError::HttpStatus { status: 404, url }) if *url == profile("oldhandle") => Ok(()),
            _ => Err(format!("expected original 404, got {:?}", result)),
        }
    }

    #[test]
    fn redirect_page_failure_surfaces_404() {
        let fake = FakeTransport::new(|url, _| {
            if url.starts_with(HANDLE_PAGE_BASE) {
                Err(ApiError::HttpStatus {
                    status: 502,
                    url: url.to_string(),
                })
            } else {
                status_response(url, 404)
            }
        });
        let result = lookup_with_redirect(&fake, "oldhandle", true, lookup(&fake));
        assert!(result.err().is_some_and(|e| e.is_not_found()));
    }

    #[test]
    fn non_404_errors_skip_redirect() {
        let fake = FakeTransport::new(|url, _| status_response(url, 500));
        let result = lookup_with_redirect(&fake, "someone", true, lookup(&fake));
        assert_eq!(result.err().and_then(|e| e.status()), Some(500));
        assert_eq!(fake.call_count(), 1);
    }
}
