use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::alphavantage::parse_best_matches;
use super::http_client;
use super::newsapi::parse_headlines;
use super::traits::{HeadlineSource, QuoteProvider, SymbolSearch};
use crate::errors::CoreError;
use crate::models::quote::{NewsArticle, Quote, SymbolMatch};

const PROVIDER: &str = "proxy";

/// Client for a deployed proxy exposing `/api/quote`, `/api/search` and
/// `/api/news`. Holds no secrets: the proxy injects them upstream.
pub struct ProxyClient {
    client: Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<(bool, Value), CoreError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(?query, "Requesting {url}");
        let response = self.client.get(&url).query(query).send().await?;
        let ok = response.status().is_success();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((ok, body))
    }
}

/// The message carried by an `{"error": "..."}` envelope, if any.
fn error_message(body: &Value) -> Option<&str> {
    body.get("error").and_then(Value::as_str)
}

#[async_trait]
impl QuoteProvider for ProxyClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let (ok, body) = self.get_json("/api/quote", &[("symbol", symbol)]).await?;
        if let Some(message) = error_message(&body) {
            return Err(CoreError::api(PROVIDER, message));
        }
        if !ok {
            return Err(CoreError::api(PROVIDER, "Failed to fetch quote from our server."));
        }
        serde_json::from_value(body)
            .map_err(|e| CoreError::api(PROVIDER, format!("Malformed quote for {symbol}: {e}")))
    }
}

#[async_trait]
impl SymbolSearch for ProxyClient {
    async fn search(&self, keyword: &str) -> Result<Vec<SymbolMatch>, CoreError> {
        let (_, body) = self.get_json("/api/search", &[("keyword", keyword)]).await?;
        if body.get("bestMatches").is_none() {
            return Ok(Vec::new());
        }
        parse_best_matches(body)
    }
}

#[async_trait]
impl HeadlineSource for ProxyClient {
    async fn top_headlines(&self) -> Result<Vec<NewsArticle>, CoreError> {
        let (ok, body) = self.get_json("/api/news", &[]).await?;
        if !ok {
            return Err(CoreError::api(
                PROVIDER,
                "Failed to fetch news headlines from our server.",
            ));
        }
        if let Some(message) = error_message(&body) {
            return Err(CoreError::api(PROVIDER, message));
        }
        parse_headlines(body)
    }
}
