use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::http_client;
use super::traits::{QuoteProvider, SymbolSearch};
use crate::errors::CoreError;
use crate::models::quote::{Quote, SymbolMatch};

const PROVIDER: &str = "Alpha Vantage";

/// Alpha Vantage API provider: secondary quote provider for exchange-suffixed
/// tickers (e.g. "VUAA.L") and the symbol-search backend.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (settings key `alphavantage`).
/// - **Rate limiting**: signalled in-band by a `Note` or `Information` field
///   on an otherwise successful response.
pub struct AlphaVantageProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Issue one `SYMBOL_SEARCH` call and return the upstream JSON verbatim.
    #[instrument(name = "AlphaVantageSearch", skip(self), fields(keyword = %keyword))]
    pub async fn symbol_search_raw(&self, keyword: &str) -> Result<Value, CoreError> {
        let response = self.query(&[("function", "SYMBOL_SEARCH"), ("keywords", keyword)]).await?;
        if !response.status().is_success() {
            return Err(CoreError::api(
                PROVIDER,
                "Failed to fetch search results from the source.",
            ));
        }
        response.json().await.map_err(|e| {
            CoreError::api(PROVIDER, format!("Failed to parse search results for {keyword}: {e}"))
        })
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<reqwest::Response, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::MissingSecret("Alpha Vantage API".into()))?;

        let url = format!("{}/query", self.base_url);
        debug!(?params, "Requesting {url}");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?;
        Ok(response)
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "bestMatches", default)]
    best_matches: Vec<SearchMatch>,
}

#[derive(Deserialize)]
pub(crate) struct SearchMatch {
    #[serde(rename = "1. symbol")]
    symbol: String,
    #[serde(rename = "2. name")]
    name: String,
}

impl From<SearchMatch> for SymbolMatch {
    fn from(m: SearchMatch) -> Self {
        SymbolMatch {
            symbol: m.symbol,
            name: m.name,
        }
    }
}

/// Parse the `bestMatches` list out of a `SYMBOL_SEARCH` payload.
pub(crate) fn parse_best_matches(payload: Value) -> Result<Vec<SymbolMatch>, CoreError> {
    let parsed: SearchResponse = serde_json::from_value(payload)
        .map_err(|e| CoreError::api(PROVIDER, format!("Malformed search payload: {e}")))?;
    Ok(parsed.best_matches.into_iter().map(SymbolMatch::from).collect())
}

fn parse_number(field: &str, raw: Option<&str>) -> Result<f64, CoreError> {
    raw.map(|s| s.trim().trim_end_matches('%'))
        .ok_or_else(|| CoreError::api(PROVIDER, format!("Quote is missing {field}")))?
        .parse()
        .map_err(|e| CoreError::api(PROVIDER, format!("Invalid {field} format: {e}")))
}

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(name = "AlphaVantageQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let response = self.query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)]).await?;
        if !response.status().is_success() {
            return Err(CoreError::api(PROVIDER, "Alpha Vantage API request failed"));
        }

        let resp: GlobalQuoteResponse = response.json().await.map_err(|e| {
            CoreError::api(PROVIDER, format!("Failed to parse quote for {symbol}: {e}"))
        })?;

        if let Some(note) = resp.note.or(resp.information) {
            warn!(%note, "Alpha Vantage rate limit signalled");
            return Err(CoreError::RateLimited {
                provider: PROVIDER.into(),
            });
        }

        let quote = resp
            .global_quote
            .filter(|q| q.price.as_deref().is_some_and(|p| !p.is_empty()))
            .ok_or_else(|| {
                CoreError::api(
                    PROVIDER,
                    "Invalid ticker or no data available from Alpha Vantage.",
                )
            })?;

        Ok(Quote {
            price: parse_number("price", quote.price.as_deref())?,
            change: parse_number("change", quote.change.as_deref())?,
            changes_percentage: parse_number("change percent", quote.change_percent.as_deref())?,
            symbol: quote.symbol.unwrap_or_else(|| symbol.to_uppercase()),
        })
    }
}

#[async_trait]
impl SymbolSearch for AlphaVantageProvider {
    async fn search(&self, keyword: &str) -> Result<Vec<SymbolMatch>, CoreError> {
        let payload = self.symbol_search_raw(keyword).await?;
        parse_best_matches(payload)
    }
}
