//! substack-api: blocking client for Substack's public JSON endpoints, plus a `substack` CLI that prints JSON.

pub mod api;
pub mod cli;
pub mod config;
pub mod model;

// Re-exports for CLI and consumers.
pub use api::{ApiError, AuthStatus, Session, SessionBuilder, Transport};
pub use model::{
    list_all_categories, Category, CategoryInfo, Newsletter, Post, PostData, PostSorting,
    Subscription, User, UserProfile,
};
