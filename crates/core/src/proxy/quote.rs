use async_trait::async_trait;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{ProxyHandler, ProxyRequest, ProxyResponse};
use crate::config::Settings;
use crate::providers::registry::QuoteProviderRegistry;
use crate::providers::traits::QuoteProvider;

/// `GET /api/quote?symbol=…`: routes the ticker to its provider and returns
/// a normalised `{symbol, price, change, changesPercentage}` object.
pub struct QuoteProxy {
    providers: QuoteProviderRegistry,
}

impl QuoteProxy {
    pub fn new(providers: QuoteProviderRegistry) -> Self {
        Self { providers }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(QuoteProviderRegistry::new_with_defaults(settings))
    }
}

#[async_trait]
impl ProxyHandler for QuoteProxy {
    fn path(&self) -> &'static str {
        "/api/quote"
    }

    #[instrument(name = "QuoteProxy", skip_all)]
    async fn handle(&self, request: &ProxyRequest) -> ProxyResponse {
        let symbol = match request.require("symbol", "Ticker symbol") {
            Ok(symbol) => symbol,
            Err(e) => return ProxyResponse::from_error(&e),
        };
        let symbol = symbol.to_uppercase();

        // the routed provider reports a missing secret before any I/O
        match self.providers.fetch_quote(&symbol).await {
            Ok(quote) => {
                info!(symbol = %quote.symbol, route = %self.providers.router().route(&symbol), "Quote relayed");
                ProxyResponse::ok(json!({
                    "symbol": quote.symbol,
                    "price": quote.price,
                    "change": quote.change,
                    "changesPercentage": quote.changes_percentage,
                }))
            }
            Err(e) => {
                warn!(%symbol, error = %e, "Quote upstream failed");
                ProxyResponse::from_error(&e)
            }
        }
    }
}
