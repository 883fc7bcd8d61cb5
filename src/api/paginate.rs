//! Repeated list-endpoint calls with an offset or page-number cursor.
//!
//! Failure policy: an error on the first page propagates; an error on a later page drops that page
//! and returns what was already collected.

use super::{fetch_json, ApiError, Transport};
use serde_json::Value;
use tracing::{debug, warn};

/// How the cursor is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `offset` and `limit` query parameters. A short page means end of data.
    Offset { page_size: usize },
    /// 0-based `page` query parameter. End of data is signalled by `more: false`.
    PageNumber { max_pages: u32 },
}

/// Items from one response, plus the endpoint's "more" flag if it reports one.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    pub more: Option<bool>,
}

impl Page {
    /// The response body is the item array itself.
    pub fn from_array(value: Value) -> Result<Page, ApiError> {
        match value {
            Value::Array(items) => Ok(Page { items, more: None }),
            _ => Err(ApiError::UnexpectedBody { expected: "array" }),
        }
    }

    /// Items live under `items_field`; `more_field` is an optional boolean.
    pub fn from_fields(value: Value, items_field: &str, more_field: &str) -> Result<Page, ApiError> {
        let Value::Object(mut map) = value else {
            return Err(ApiError::UnexpectedBody { expected: "object" });
        };
        let items = match map.remove(items_field) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(ApiError::MissingField {
                    field: items_field.to_string(),
                })
            }
        };
        let more = map.get(more_field).and_then(Value::as_bool);
        Ok(Page { items, more })
    }
}

/// Items collected by [Paginator::fetch_listing]. `complete` is false when a later page failed.
#[derive(Debug, Default)]
pub struct Listing {
    pub items: Vec<Value>,
    pub complete: bool,
}

/// One paginated listing: endpoint, base query, cursor style, and an optional total limit.
pub struct Paginator<'a> {
    transport: &'a dyn Transport,
    url: String,
    params: Vec<(String, String)>,
    style: PageStyle,
    limit: Option<usize>,
}

impl<'a> Paginator<'a> {
    pub fn new(transport: &'a dyn Transport, url: impl Into<String>, style: PageStyle) -> Self {
        Self {
            transport,
            url: url.into(),
            params: Vec::new(),
            style,
            limit: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Stop once this many items are collected. `None` means until the endpoint runs out.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn query_for(&self, page_index: usize) -> Vec<(String, String)> {
        let mut query = self.params.clone();
        match self.style {
            PageStyle::Offset { page_size } => {
                query.push(("offset".to_string(), (page_index * page_size).to_string()));
                query.push(("limit".to_string(), page_size.to_string()));
            }
            PageStyle::PageNumber { .. } => {
                query.push(("page".to_string(), page_index.to_string()));
            }
        }
        query
    }

    /// Fetch pages until exhaustion or `limit`, decoding each body with `extract`.
    pub fn fetch_all<F>(&self, extract: F) -> Result<Vec<Value>, ApiError>
    where
        F: Fn(Value) -> Result<Page, ApiError>,
    {
        self.fetch_listing(extract).map(|listing| listing.items)
    }

    /// Like [fetch_all](Self::fetch_all), but reports whether a later page was dropped.
    pub fn fetch_listing<F>(&self, extract: F) -> Result<Listing, ApiError>
    where
        F: Fn(Value) -> Result<Page, ApiError>,
    {
        if self.limit == Some(0) {
            return Ok(Listing {
                items: Vec::new(),
                complete: true,
            });
        }
        let mut complete = true;
        let mut results = Vec::new();
        let mut page_index = 0usize;
        loop {
            if let PageStyle::PageNumber { max_pages } = self.style {
                if page_index >= max_pages as usize {
                    debug!(url = %self.url, max_pages, "page cap reached");
                    break;
                }
            }
            let query = self.query_for(page_index);
            let page = match fetch_json::<Value>(self.transport, &self.url, &query).and_then(&extract)
            {
                Ok(page) => page,
                Err(e) if page_index == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        url = %self.url,
                        page = page_index,
                        collected = results.len(),
                        error = %e,
                        "page fetch failed; returning partial results"
                    );
                    complete = false;
                    break;
                }
            };
            let received = page.items.len();
            results.extend(page.items);
            page_index += 1;

            if let Some(limit) = self.limit {
                if results.len() >= limit {
                    results.truncate(limit);
                    break;
                }
            }
            if received == 0 || page.more == Some(false) {
                break;
            }
            if let PageStyle::Offset { page_size } = self.style {
                if received < page_size {
                    break;
                }
            }
        }
        debug!(url = %self.url, pages = page_index, items = results.len(), complete, "pagination finished");
        Ok(Listing {
            items: results,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{json_response, query_value, status_response, FakeTransport};
    use serde_json::json;

    const ARCHIVE: &str = "https://example.substack.com/api/v1/archive";
    const CATEGORY: &str = "https://substack.com/api/v1/category/public/1/all";

    /// Archive endpoint serving items 0..total with offset/limit semantics.
    fn archive(total: usize) -> FakeTransport {
        FakeTransport::new(move |url, query| {
            let offset: usize = query_value(query, "offset")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let limit: usize = query_value(query, "limit")
                .and_then(|v| v.parse().ok())
                .unwrap_or(15);
            let items: Vec<Value> = (offset..total.min(offset + limit))
                .map(|i| json!({ "id": i }))
                .collect();
            json_response(url, Value::Array(items))
        })
    }

    fn ids(items: &[Value]) -> Vec<u64> {
        items.iter().filter_map(|v| v["id"].as_u64()).collect()
    }

    #[test]
    fn limit_spanning_pages_uses_ceil_requests() -> Result<(), ApiError> {
        let fake = archive(100);
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .param("sort", "new")
            .limit(Some(40))
            .fetch_all(Page::from_array)?;
        assert_eq!(items.len(), 40);
        assert_eq!(ids(&items), (0..40).collect::<Vec<_>>());
        // ceil(40 / 15) = 3
        assert_eq!(fake.call_count(), 3);
        Ok(())
    }

    #[test]
    fn exact_multiple_limit_stops_without_extra_request() -> Result<(), ApiError> {
        let fake = archive(100);
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .limit(Some(30))
            .fetch_all(Page::from_array)?;
        assert_eq!(items.len(), 30);
        assert_eq!(fake.call_count(), 2);
        Ok(())
    }

    #[test]
    fn limit_beyond_available_returns_everything() -> Result<(), ApiError> {
        let fake = archive(20);
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .limit(Some(50))
            .fetch_all(Page::from_array)?;
        assert_eq!(items.len(), 20);
        assert_eq!(fake.call_count(), 2);
        Ok(())
    }

    #[test]
    fn unbounded_stops_on_empty_page() -> Result<(), ApiError> {
        let fake = archive(30);
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .fetch_all(Page::from_array)?;
        assert_eq!(items.len(), 30);
        // Two full pages, then an empty third.
        assert_eq!(fake.call_count(), 3);
        Ok(())
    }

    #[test]
    fn zero_limit_makes_no_requests() -> Result<(), ApiError> {
        let fake = archive(100);
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .limit(Some(0))
            .fetch_all(Page::from_array)?;
        assert!(items.is_empty());
        assert_eq!(fake.call_count(), 0);
        Ok(())
    }

    #[test]
    fn offset_query_carries_base_params_and_cursor() -> Result<(), ApiError> {
        let fake = archive(100);
        Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 10 })
            .param("sort", "top")
            .limit(Some(20))
            .fetch_all(Page::from_array)?;
        let calls = fake.calls();
        assert_eq!(query_value(&calls[1].query, "sort"), Some("top"));
        assert_eq!(query_value(&calls[1].query, "offset"), Some("10"));
        assert_eq!(query_value(&calls[1].query, "limit"), Some("10"));
        Ok(())
    }

    #[test]
    fn first_page_error_propagates() {
        let fake = FakeTransport::new(|url, _| status_response(url, 500));
        let result = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .fetch_all(Page::from_array);
        assert_eq!(result.err().and_then(|e| e.status()), Some(500));
    }

    #[test]
    fn later_page_error_returns_partial_results() -> Result<(), ApiError> {
        let fake = FakeTransport::new(|url, query| {
            if query_value(query, "offset") == Some("0") {
                let items: Vec<Value> = (0..15).map(|i| json!({ "id": i })).collect();
                json_response(url, Value::Array(items))
            } else {
                status_response(url, 429)
            }
        });
        let items = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .limit(Some(45))
            .fetch_all(Page::from_array)?;
        assert_eq!(items.len(), 15);
        assert_eq!(fake.call_count(), 2);

        let listing = Paginator::new(&fake, ARCHIVE, PageStyle::Offset { page_size: 15 })
            .limit(Some(45))
            .fetch_listing(Page::from_array)?;
        assert!(!listing.complete);
        Ok(())
    }

    #[test]
    fn page_number_style_follows_more_flag() -> Result<(), ApiError> {
        let fake = FakeTransport::new(|url, query| {
            let page: u32 = query_value(query, "page")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            json_response(
                url,
                json!({
                    "publications": [{ "id": page * 2 }, { "id": page * 2 + 1 }],
                    "more": (page < 2),
                }),
            )
        });
        let items = Paginator::new(&fake, CATEGORY, PageStyle::PageNumber { max_pages: 21 })
            .fetch_all(|v| Page::from_fields(v, "publications", "more"))?;
        assert_eq!(ids(&items), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(fake.call_count(), 3);
        Ok(())
    }

    #[test]
    fn page_number_style_respects_page_cap() -> Result<(), ApiError> {
        let fake = FakeTransport::new(|url, _| {
            json_response(url, json!({ "publications": [{ "id": 1 }], "more": true }))
        });
        let items = Paginator::new(&fake, CATEGORY, PageStyle::PageNumber { max_pages: 21 })
            .fetch_all(|v| Page::from_fields(v, "publications", "more"))?;
        assert_eq!(items.len(), 21);
        assert_eq!(fake.call_count(), 21);

        let listing = Paginator::new(&fake, CATEGORY, PageStyle::PageNumber { max_pages: 21 })
            .fetch_listing(|v| Page::from_fields(v, "publications", "more"))?;
        assert!(listing.complete);
        Ok(())
    }

    #[test]
    fn from_fields_requires_items_array() {
        let result = Page::from_fields(json!({ "more": false }), "publications", "more");
        assert!(matches!(result, Err(ApiError::MissingField { field }) if field == "publications"));
    }

    #[test]
    fn from_array_rejects_non_array_body() -> Result<(), String> {
        let result = Page::from_array(json!({ "error": "rate limited" }));
        match &result {
            Err(e @ ApiError::UnexpectedBody { expected: "array" }) => {
                assert_eq!(e.to_string(), "Response body is not a JSON array");
                Ok(())
            }
            _ => Err(format!("expected UnexpectedBody, got {:?}", result)),
        }
    }

    #[test]
    fn from_fields_rejects_non_object_body() {
        let result = Page::from_fields(json!([1, 2]), "publications", "more");
        assert!(matches!(result, Err(ApiError::UnexpectedBody { expected: "object" })));
    }
}
