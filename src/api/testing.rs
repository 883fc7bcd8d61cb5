//! In-memory [Transport] for unit tests: answers from a route closure and records every call.

use super::{ApiError, HttpResponse, Query, Transport};
use serde_json::Value;
use std::sync::Mutex;

type Route = Box<dyn Fn(&str, &Query) -> Result<HttpResponse, ApiError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub method: &'static str,
    pub url: String,
    pub query: Vec<(String, String)>,
}

pub(crate) struct FakeTransport {
    route: Route,
    calls: Mutex<Vec<Call>>,
    authenticated: bool,
}

impl FakeTransport {
    pub fn new(
        route: impl Fn(&str, &Query) -> Result<HttpResponse, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            route: Box::new(route),
            calls: Mutex::new(Vec::new()),
            authenticated: false,
        }
    }

    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Number of calls whose URL starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.url.starts_with(prefix))
            .count()
    }

    fn record(&self, method: &'static str, url: &str, query: &Query) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                method,
                url: url.to_string(),
                query: query.to_vec(),
            });
        }
    }
}

impl Transport for FakeTransport {
    fn get(&self, url: &str, query: &Query) -> Result<HttpResponse, ApiError> {
        self.record("GET", url, query);
        (self.route)(url, query)
    }

    fn post(&self, url: &str, _body: &Value) -> Result<HttpResponse, ApiError> {
        self.record("POST", url, &[]);
        (self.route)(url, &[])
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

pub(crate) fn json_response(url: &str, body: Value) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse {
        status: 200,
        url: url.to_string(),
        body: body.to_string(),
    })
}

pub(crate) fn status_response(url: &str, status: u16) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse {
        status,
        url: url.to_string(),
        body: String::new(),
    })
}

/// 200 response whose final URL differs from the requested one, as after following redirects.
pub(crate) fn redirected_response(final_url: &str) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse {
        status: 200,
        url: final_url.to_string(),
        body: "<html></html>".to_string(),
    })
}

pub(crate) fn query_value<'a>(query: &'a Query, key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
