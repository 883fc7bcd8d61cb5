//! A Substack user profile, looked up by handle. Renamed handles are followed on request.

use super::{publication_domain, str_field};
use crate::api::{fetch_json, lookup_with_redirect, ApiError, EntityCache, Transport};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

fn profile_endpoint(username: &str) -> String {
    format!("https://substack.com/api/v1/user/{}/public_profile", username)
}

/// Public profile payload. Fields not modeled here are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub handle: Option<String>,
    pub profile_set_up_at: Option<String>,
    pub subscriptions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One publication the user subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub publication_id: u64,
    pub publication_name: String,
    pub domain: String,
    pub membership_state: String,
}

impl Subscription {
    fn from_value(sub: &Value) -> Result<Self, ApiError> {
        let publication = sub.get("publication").ok_or_else(|| ApiError::MissingField {
            field: "publication".to_string(),
        })?;
        let publication_id = publication
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::MissingField {
                field: "publication.id".to_string(),
            })?;
        let domain = publication_domain(publication).ok_or_else(|| ApiError::MissingField {
            field: "publication.subdomain".to_string(),
        })?;
        Ok(Subscription {
            publication_id,
            publication_name: str_field(publication, "name")?.to_string(),
            domain,
            membership_state: str_field(sub, "membership_state")?.to_string(),
        })
    }
}

pub struct User {
    username: String,
    original_username: Option<String>,
    was_redirected: bool,
    follow_redirects: bool,
    transport: Arc<dyn Transport>,
    profile: EntityCache<UserProfile>,
}

impl User {
    /// Handle for `username`. Renamed handles are followed by default.
    pub fn new(username: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            username: username.to_string(),
            original_username: None,
            was_redirected: false,
            follow_redirects: true,
            transport,
            profile: EntityCache::new(),
        }
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Current handle; changes to the new handle after a followed redirect.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Handle this user was constructed with, if a redirect replaced it.
    pub fn original_username(&self) -> Option<&str> {
        self.original_username.as_deref()
    }

    pub fn was_redirected(&self) -> bool {
        self.was_redirected
    }

    pub fn endpoint(&self) -> String {
        profile_endpoint(&self.username)
    }

    /// Complete profile payload, cached after the first call.
    pub fn get_raw_data(&mut self, force_refresh: bool) -> Result<&UserProfile, ApiError> {
        let transport = self.transport.as_ref();
        let follow = self.follow_redirects;
        let username = &mut self.username;
        let original_username = &mut self.original_username;
        let was_redirected = &mut self.was_redirected;
        self.profile.get_or_fetch(force_refresh, || {
            let resolution = lookup_with_redirect(transport, username.as_str(), follow, |handle| {
                fetch_json(transport, &profile_endpoint(handle), &[])
            })?;
            if let Some(new_handle) = resolution.redirected_to {
                let old = std::mem::replace(username, new_handle);
                original_username.get_or_insert(old);
                *was_redirected = true;
            }
            Ok(resolution.value)
        })
    }

    pub fn id(&mut self) -> Result<u64, ApiError> {
        self.get_raw_data(false)?
            .id
            .ok_or_else(|| ApiError::MissingField {
                field: "id".to_string(),
            })
    }

    pub fn name(&mut self) -> Result<String, ApiError> {
        self.get_raw_data(false)?
            .name
            .clone()
            .ok_or_else(|| ApiError::MissingField {
                field: "name".to_string(),
            })
    }

    pub fn profile_set_up_at(&mut self) -> Result<String, ApiError> {
        self.get_raw_data(false)?
            .profile_set_up_at
            .clone()
            .ok_or_else(|| ApiError::MissingField {
                field: "profile_set_up_at".to_string(),
            })
    }

    /// Publications the user subscribes to, with resolved domains.
    pub fn get_subscriptions(&mut self) -> Result<Vec<Subscription>, ApiError> {
        self.get_raw_data(false)?
            .subscriptions
            .iter()
            .map(Subscription::from_value)
            .collect()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User: {}", self.username)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("original_username", &self.original_username)
            .field("was_redirected", &self.was_redirected)
            .field("follow_redirects", &self.follow_redirects)
            .finish_non_exhaustive()
    }
}
