use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, instrument, warn};

use super::{ProxyHandler, ProxyRequest, ProxyResponse};
use crate::config::{Settings, NEWS_API_KEY};
use crate::providers::newsapi::NewsApiProvider;

/// `GET /api/news`: relays NewsAPI top business headlines.
pub struct NewsProxy {
    upstream: NewsApiProvider,
}

impl NewsProxy {
    pub fn new(upstream: NewsApiProvider) -> Self {
        Self { upstream }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(NewsApiProvider::new(
            settings.endpoints.news_api.clone(),
            settings.api_key(NEWS_API_KEY).map(str::to_string),
        ))
    }
}

#[async_trait]
impl ProxyHandler for NewsProxy {
    fn path(&self) -> &'static str {
        "/api/news"
    }

    #[instrument(name = "NewsProxy", skip_all)]
    async fn handle(&self, _request: &ProxyRequest) -> ProxyResponse {
        if !self.upstream.is_configured() {
            warn!("Headlines requested without a NewsAPI key");
            return ProxyResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "News API key is missing.");
        }

        match self.upstream.top_headlines_raw().await {
            Ok(payload) => {
                info!("Headlines relayed");
                ProxyResponse::ok(payload)
            }
            Err(e) => {
                warn!(error = %e, "Headlines upstream failed");
                ProxyResponse::from_error(&e)
            }
        }
    }
}
