use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, instrument, warn};

use super::{ProxyHandler, ProxyRequest, ProxyResponse};
use crate::config::{Settings, ALPHA_VANTAGE_KEY};
use crate::providers::alphavantage::AlphaVantageProvider;

/// `GET /api/search?keyword=…`: relays an Alpha Vantage symbol search.
pub struct SearchProxy {
    upstream: AlphaVantageProvider,
}

impl SearchProxy {
    pub fn new(upstream: AlphaVantageProvider) -> Self {
        Self { upstream }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(AlphaVantageProvider::new(
            settings.endpoints.alpha_vantage.clone(),
            settings.api_key(ALPHA_VANTAGE_KEY).map(str::to_string),
        ))
    }
}

#[async_trait]
impl ProxyHandler for SearchProxy {
    fn path(&self) -> &'static str {
        "/api/search"
    }

    #[instrument(name = "SearchProxy", skip_all)]
    async fn handle(&self, request: &ProxyRequest) -> ProxyResponse {
        if !self.upstream.is_configured() {
            warn!("Search requested without an Alpha Vantage key");
            return ProxyResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "API key is missing.");
        }
        let keyword = match request.require("keyword", "Search keyword") {
            Ok(keyword) => keyword,
            Err(e) => return ProxyResponse::from_error(&e),
        };

        match self.upstream.symbol_search_raw(keyword).await {
            Ok(payload) => {
                info!(keyword, "Search relayed");
                ProxyResponse::ok(payload)
            }
            Err(e) => {
                warn!(keyword, error = %e, "Search upstream failed");
                ProxyResponse::from_error(&e)
            }
        }
    }
}
