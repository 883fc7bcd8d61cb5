//! Newsletter categories, addressed by name or numeric id.

use super::{str_field, Newsletter};
use crate::api::{fetch_json, ApiError, EntityCache, Page, PageStyle, Paginator, Transport};
use tracing::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const CATEGORIES_ENDPOINT: &str = "https://substack.com/api/v1/categories";
/// The category listing stops serving after 21 pages.
const MAX_CATEGORY_PAGES: u32 = 21;

/// One row of the category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: u64,
    pub name: String,
}

/// Fetch the name/id table of every newsletter category.
pub fn list_all_categories(transport: &dyn Transport) -> Result<Vec<CategoryInfo>, ApiError> {
    fetch_json(transport, CATEGORIES_ENDPOINT, &[])
}

pub struct Category {
    name: String,
    id: u64,
    transport: Arc<dyn Transport>,
    newsletters: EntityCache<Vec<Value>>,
    /// False while the cached listing is missing pages.
    newsletters_complete: bool,
}

impl Category {
    /// Build from a name, an id, or both. A single key is resolved against [list_all_categories];
    /// when both are given they are taken as-is.
    pub fn new(
        name: Option<&str>,
        id: Option<u64>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ApiError> {
        let (name, id) = match (name, id) {
            (Some(name), Some(id)) => (name.to_string(), id),
            (Some(name), None) => {
                let categories = list_all_categories(transport.as_ref())?;
                let found = categories
                    .into_iter()
                    .find(|c| c.name == name)
                    .ok_or_else(|| ApiError::CategoryNotFound {
                        key: format!("name '{}'", name),
                    })?;
                (found.name, found.id)
            }
            (None, Some(id)) => {
                let categories = list_all_categories(transport.as_ref())?;
                let found = categories
                    .into_iter()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ApiError::CategoryNotFound {
                        key: format!("ID {}", id),
                    })?;
                (found.name, found.id)
            }
            (None, None) => {
                return Err(ApiError::MissingArgument(
                    "Either name or id must be provided",
                ))
            }
        };
        Ok(Self {
            name,
            id,
            transport,
            newsletters: EntityCache::new(),
            newsletters_complete: false,
        })
    }

    pub fn from_name(name: &str, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        Self::new(Some(name), None, transport)
    }

    pub fn from_id(id: u64, transport: Arc<dyn Transport>) -> Result<Self, ApiError> {
        Self::new(None, Some(id), transport)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Full metadata of every newsletter in the category, cached after the first complete fetch.
    ///
    /// A listing cut short by a failed later page is returned but fetched again on the next call.
    pub fn get_newsletter_metadata(&mut self, force_refresh: bool) -> Result<&[Value], ApiError> {
        let transport = self.transport.as_ref();
        let endpoint = format!("https://substack.com/api/v1/category/public/{}/all", self.id);
        let refetch = force_refresh || !self.newsletters_complete;
        let complete = &mut self.newsletters_complete;
        let data = self.newsletters.get_or_fetch(refetch, || {
            let listing = Paginator::new(
                transport,
                endpoint.as_str(),
                PageStyle::PageNumber {
                    max_pages: MAX_CATEGORY_PAGES,
                },
            )
            .fetch_listing(|v| Page::from_fields(v, "publications", "more"))?;
            if !listing.complete {
                warn!(url = %endpoint, items = listing.items.len(), "category listing is partial; not caching it");
            }
            *complete = listing.complete;
            Ok(listing.items)
        })?;
        Ok(data.as_slice())
    }

    pub fn get_newsletter_urls(&mut self) -> Result<Vec<String>, ApiError> {
        self.get_newsletter_metadata(false)?
            .iter()
            .map(|item| str_field(item, "base_url").map(str::to_string))
            .collect()
    }

    pub fn get_newsletters(&mut self) -> Result<Vec<Newsletter>, ApiError> {
        let urls = self.get_newsletter_urls()?;
        Ok(urls
            .iter()
            .map(|u| Newsletter::new(u, self.transport.clone()))
            .collect())
    }

    /// Re-fetch the newsletter listing, replacing the cached copy.
    pub fn refresh_data(&mut self) -> Result<(), ApiError> {
        self.get_newsletter_metadata(true).map(|_| ())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
