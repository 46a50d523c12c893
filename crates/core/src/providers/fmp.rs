use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::http_client;
use super::traits::QuoteProvider;
use crate::errors::CoreError;
use crate::models::quote::Quote;

const PROVIDER: &str = "FMP";

/// Financial Modeling Prep: primary quote provider for listings on the
/// primary market (plain tickers such as "AAPL").
///
/// - **Requires**: API key (settings key `fmp`).
/// - **Endpoint**: `GET /api/v3/quote/{ticker}?apikey=…`, returns a JSON array.
pub struct FmpProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FmpProvider {
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
}

#[derive(Deserialize)]
struct FmpQuote {
    symbol: Option<String>,
    price: Option<f64>,
    change: Option<f64>,
    #[serde(rename = "changesPercentage")]
    changes_percentage: Option<f64>,
}

#[async_trait]
impl QuoteProvider for FmpProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    #[instrument(name = "FmpQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::MissingSecret("FMP API".into()))?;

        let url = format!("{}/api/v3/quote/{}", self.base_url, symbol);
        debug!("Requesting quote from {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("apikey", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "FMP returned an error status");
            return Err(CoreError::api(PROVIDER, "FMP API request failed"));
        }

        let quotes: Vec<FmpQuote> = response.json().await.map_err(|e| {
            CoreError::api(PROVIDER, format!("Failed to parse quote for {symbol}: {e}"))
        })?;

        let quote = quotes
            .into_iter()
            .next()
            .filter(|q| q.price.is_some_and(|p| p != 0.0))
            .ok_or_else(|| {
                CoreError::api(PROVIDER, "Invalid ticker or no data available from FMP.")
            })?;

        Ok(Quote {
            symbol: quote.symbol.unwrap_or_else(|| symbol.to_uppercase()),
            price: quote.price.unwrap_or_default(),
            change: quote.change.unwrap_or_default(),
            changes_percentage: quote.changes_percentage.unwrap_or_default(),
        })
    }
}
