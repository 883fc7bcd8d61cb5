//! A single post (article or podcast episode), fetched from `{base}/api/v1/posts/{slug}`.

use crate::api::{fetch_json, ApiError, EntityCache, Transport};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const PAID_AUDIENCE: &str = "only_paid";

/// Post payload. Fields not modeled here are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostData {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub slug: Option<String>,
    pub canonical_url: Option<String>,
    pub post_date: Option<String>,
    /// `everyone`, `only_free`, `only_paid`, or `founding`.
    pub audience: Option<String>,
    pub body_html: Option<String>,
    pub publication_id: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostData {
    pub fn is_paywalled(&self) -> bool {
        self.audience.as_deref() == Some(PAID_AUDIENCE)
    }
}

pub struct Post {
    url: String,
    base_url: String,
    slug: String,
    endpoint: String,
    transport: Arc<dyn Transport>,
    data: EntityCache<PostData>,
}

impl Post {
    /// Build a handle from a post URL such as `https://example.substack.com/p/some-slug`.
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        let parsed = Url::parse(url).map_err(|e| ApiError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        let base_url = parsed.origin().ascii_serialization();
        let slug = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string)
            .ok_or_else(|| ApiError::InvalidUrl {
                input: url.to_string(),
                reason: "URL has no post slug".to_string(),
            })?;
        let endpoint = format!("{}/api/v1/posts/{}", base_url, slug);
        Ok(Self {
            url: url.to_string(),
            base_url,
            slug,
            endpoint,
            transport,
            data: EntityCache::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full post payload, cached after the first call.
    pub fn get_metadata(&mut self, force_refresh: bool) -> Result<&PostData, ApiError> {
        if self.data.is_cached() && !force_refresh {
            debug!(url = %self.url, "post cache hit");
        }
        let transport = self.transport.as_ref();
        let endpoint = &self.endpoint;
        self.data
            .get_or_fetch(force_refresh, || fetch_json(transport, endpoint, &[]))
    }

    /// HTML body, or `None` when the post has none (e.g. paywalled without auth).
    pub fn get_content(&mut self, force_refresh: bool) -> Result<Option<String>, ApiError> {
        let authenticated = self.transport.is_authenticated();
        let url = self.url.clone();
        let data = self.get_metadata(force_refresh)?;
        let content = data.body_html.clone().filter(|b| !b.is_empty());
        if content.is_none() && data.is_paywalled() && !authenticated {
            warn!(url = %url, "post is paywalled; provide a cookie file to access full content");
        }
        Ok(content)
    }

    /// Body converted to Markdown.
    pub fn get_content_markdown(&mut self, force_refresh: bool) -> Result<Option<String>, ApiError> {
        Ok(self
            .get_content(force_refresh)?
            .map(|html| html2md::parse_html(&html)))
    }

    pub fn is_paywalled(&mut self) -> Result<bool, ApiError> {
        Ok(self.get_metadata(false)?.is_paywalled())
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Post: {}", self.url)
    }
}

impl fmt::Debug for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Post")
            .field("url", &self.url)
            .field("endpoint", &self.endpoint)
            .field("cached", &self.data.is_cached())
            .finish_non_exhaustive()
    }
}
