//! Domain entities over Substack's JSON: newsletters, posts, users, and categories.
//!
//! Each handle owns its cache and shares the [Transport](crate::api::Transport) it was built with.

mod category;
mod newsletter;
mod post;
mod user;

pub use category::{list_all_categories, Category, CategoryInfo};
pub use newsletter::{Newsletter, PostSorting, ARCHIVE_PAGE_SIZE};
pub use post::{Post, PostData};
pub use user::{Subscription, User, UserProfile};

use crate::api::ApiError;
use serde_json::Value;

/// Bare domain of a publication object: `custom_domain` when set, else `{subdomain}.substack.com`.
pub(crate) fn publication_domain(publication: &Value) -> Option<String> {
    match publication.get("custom_domain").and_then(Value::as_str) {
        Some(domain) if !domain.is_empty() => Some(domain.to_string()),
        _ => publication
            .get("subdomain")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}.substack.com", s)),
    }
}

pub(crate) fn str_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, ApiError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MissingField {
            field: field.to_string(),
        })
}
