//! A Substack publication, identified by its base URL.

use super::{publication_domain, str_field, Post, User};
use crate::api::{fetch_json, ApiError, EntityCache, Page, PageStyle, Paginator, Transport};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Items per archive request.
pub const ARCHIVE_PAGE_SIZE: usize = 15;

/// Archive ordering accepted by `/api/v1/archive?sort=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSorting {
    #[default]
    New,
    Top,
    Pinned,
    Community,
}

impl PostSorting {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostSorting::New => "new",
            PostSorting::Top => "top",
            PostSorting::Pinned => "pinned",
            PostSorting::Community => "community",
        }
    }
}

impl FromStr for PostSorting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(PostSorting::New),
            "top" => Ok(PostSorting::Top),
            "pinned" => Ok(PostSorting::Pinned),
            "community" => Ok(PostSorting::Community),
            _ => Err(format!(
                "Invalid sorting: '{}'. Use new, top, pinned, or community.",
                s
            )),
        }
    }
}

pub struct Newsletter {
    url: String,
    transport: Arc<dyn Transport>,
    recommendations: EntityCache<Vec<String>>,
    authors: EntityCache<Vec<String>>,
}

impl Newsletter {
    /// Build a handle from the publication's base URL, e.g. `https://example.substack.com`.
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            transport,
            recommendations: EntityCache::new(),
            authors: EntityCache::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn archive(&self, params: &[(&str, &str)], limit: Option<usize>) -> Result<Vec<Value>, ApiError> {
        fetch_archive(self.transport.as_ref(), &self.url, params, limit)
    }

    fn posts_from(&self, items: &[Value]) -> Result<Vec<Post>, ApiError> {
        items
            .iter()
            .map(|item| Post::new(str_field(item, "canonical_url")?, self.transport.clone()))
            .collect()
    }

    pub fn get_posts(&self, sorting: PostSorting, limit: Option<usize>) -> Result<Vec<Post>, ApiError> {
        let items = self.archive(&[("sort", sorting.as_str())], limit)?;
        self.posts_from(&items)
    }

    pub fn search_posts(&self, query: &str, limit: Option<usize>) -> Result<Vec<Post>, ApiError> {
        let items = self.archive(&[("sort", "new"), ("search", query)], limit)?;
        self.posts_from(&items)
    }

    pub fn get_podcasts(&self, limit: Option<usize>) -> Result<Vec<Post>, ApiError> {
        let items = self.archive(&[("sort", "new"), ("type", "podcast")], limit)?;
        self.posts_from(&items)
    }

    /// Publications this newsletter recommends. Empty when the newsletter has no posts.
    pub fn get_recommendations(&mut self, force_refresh: bool) -> Result<Vec<Newsletter>, ApiError> {
        let transport = &self.transport;
        let url = &self.url;
        let urls = self
            .recommendations
            .get_or_fetch(force_refresh, || fetch_recommendation_urls(transport, url))?;
        Ok(urls
            .iter()
            .map(|u| Newsletter::new(u, self.transport.clone()))
            .collect())
    }

    /// Ranked public authors of the publication.
    pub fn get_authors(&mut self, force_refresh: bool) -> Result<Vec<User>, ApiError> {
        let transport = self.transport.as_ref();
        let endpoint = format!("{}/api/v1/publication/users/ranked", self.url);
        let handles = self.authors.get_or_fetch(force_refresh, || {
            let query = [("public".to_string(), "true".to_string())];
            let authors: Vec<Value> = fetch_json(transport, &endpoint, &query)?;
            authors
                .iter()
                .map(|a| str_field(a, "handle").map(str::to_string))
                .collect()
        })?;
        Ok(handles
            .iter()
            .map(|h| User::new(h, self.transport.clone()))
            .collect())
    }
}

fn fetch_archive(
    transport: &dyn Transport,
    url: &str,
    params: &[(&str, &str)],
    limit: Option<usize>,
) -> Result<Vec<Value>, ApiError> {
    let mut paginator = Paginator::new(
        transport,
        format!("{}/api/v1/archive", url),
        PageStyle::Offset {
            page_size: ARCHIVE_PAGE_SIZE,
        },
    )
    .limit(limit);
    for (key, value) in params {
        paginator = paginator.param(*key, *value);
    }
    paginator.fetch_all(Page::from_array)
}

fn fetch_recommendation_urls(
    transport: &Arc<dyn Transport>,
    url: &str,
) -> Result<Vec<String>, ApiError> {
    let newest = fetch_archive(transport.as_ref(), url, &[("sort", "new")], Some(1))?;
    let Some(item) = newest.first() else {
        debug!(url, "no posts; no recommendations");
        return Ok(Vec::new());
    };
    let mut post = Post::new(str_field(item, "canonical_url")?, transport.clone())?;
    let publication_id =
        post.get_metadata(false)?
            .publication_id
            .ok_or_else(|| ApiError::MissingField {
                field: "publication_id".to_string(),
            })?;

    let endpoint = format!("{}/api/v1/recommendations/from/{}", url, publication_id);
    let recommendations: Vec<Value> = fetch_json(transport.as_ref(), &endpoint, &[])?;
    Ok(recommendations
        .iter()
        .filter_map(|rec| rec.get("recommendedPublication"))
        .filter_map(publication_domain)
        .map(|domain| {
            if domain.contains("://") {
                domain
            } else {
                format!("https://{}", domain)
            }
        })
        .collect())
}

impl fmt::Display for Newsletter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Newsletter: {}", self.url)
    }
}

impl fmt::Debug for Newsletter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Newsletter")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
