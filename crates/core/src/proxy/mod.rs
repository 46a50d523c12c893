//! Server-side request handlers that keep provider secrets out of clients.
//!
//! Handlers are transport-agnostic: they take the query parameters of an
//! incoming request and produce a status code plus a JSON body. Mounting
//! them behind an HTTP server is left to the embedding application.

pub mod news;
pub mod quote;
pub mod search;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::errors::CoreError;

pub use news::NewsProxy;
pub use quote::QuoteProxy;
pub use search::SearchProxy;

/// Query parameters of an incoming proxy request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyRequest {
    params: HashMap<String, String>,
}

impl ProxyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Parse `key=value` pairs; a pair without `=` is a key with an empty value.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let params = pairs
            .into_iter()
            .map(|pair| match pair.as_ref().split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.as_ref().to_string(), String::new()),
            })
            .collect();
        Self { params }
    }

    /// A parameter's value; blank values count as absent.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A parameter that must be present; `label` names it in the error.
    pub fn require(&self, name: &str, label: &str) -> Result<&str, CoreError> {
        self.param(name)
            .ok_or_else(|| CoreError::MissingParameter(label.to_string()))
    }
}

/// Status code and JSON body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ProxyResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The message of an error envelope.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    /// A failure as the client sees it: a missing parameter is the caller's
    /// fault (400), anything else is surfaced as a 500.
    pub fn from_error(err: &CoreError) -> Self {
        let status = match err {
            CoreError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::error(status, failure_reason(err))
    }
}

/// The client-facing reason for a failure: the bare upstream message for
/// API errors, the full display otherwise.
fn failure_reason(err: &CoreError) -> String {
    match err {
        CoreError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// One proxy endpoint.
#[async_trait]
pub trait ProxyHandler: Send + Sync {
    /// Mount path, e.g. `/api/quote`.
    fn path(&self) -> &'static str;

    async fn handle(&self, request: &ProxyRequest) -> ProxyResponse;
}
