//! Shared error type for the request layer and the entities built on it.

use thiserror::Error;

/// Errors surfaced by [Transport](super::Transport) calls, payload decoding, and entity validation.
#[derive(Debug, Error)]
pub enum ApiError {
    // Transport
    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to build HTTP client: {source}")]
    Client { source: reqwest::Error },

    // Payload
    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },

    #[error("Response is missing field '{field}'")]
    MissingField { field: String },

    #[error("Response body is not a JSON {expected}")]
    UnexpectedBody { expected: &'static str },

    // Validation
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("{0}")]
    MissingArgument(&'static str),

    #[error("Category {key} not found")]
    CategoryNotFound { key: String },
}

impl ApiError {
    /// HTTP status carried by the error, if it came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
