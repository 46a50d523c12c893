use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::http_client;
use super::traits::HeadlineSource;
use crate::errors::CoreError;
use crate::models::quote::NewsArticle;

const PROVIDER: &str = "NewsAPI";

/// NewsAPI top business headlines (country `us`, category `business`).
///
/// - **Requires**: API key (settings key `newsapi`).
/// - **Free tier**: 100 requests/day.
pub struct NewsApiProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl NewsApiProvider {
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

    /// Issue one top-headlines call and return the upstream JSON verbatim.
    #[instrument(name = "NewsApiHeadlines", skip(self))]
    pub async fn top_headlines_raw(&self) -> Result<Value, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CoreError::MissingSecret("News API".into()))?;

        let url = format!("{}/v2/top-headlines", self.base_url);
        debug!("Requesting headlines from {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("country", "us"), ("category", "business"), ("apiKey", api_key)])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "NewsAPI returned an error status");
            return Err(CoreError::api(PROVIDER, "Failed to fetch news from the source."));
        }

        response
            .json()
            .await
            .map_err(|e| CoreError::api(PROVIDER, format!("Failed to parse headlines: {e}")))
    }
}

// ── NewsAPI response types ──────────────────────────────────────────

#[derive(Deserialize)]
struct HeadlinesResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "urlToImage")]
    url_to_image: Option<String>,
    source: Option<RawSource>,
}

#[derive(Deserialize)]
struct RawSource {
    name: Option<String>,
}

/// Convert a NewsAPI payload (as relayed verbatim by the news proxy) into articles.
/// Articles without a title or url are dropped.
pub(crate) fn parse_headlines(payload: Value) -> Result<Vec<NewsArticle>, CoreError> {
    let parsed: HeadlinesResponse = serde_json::from_value(payload)
        .map_err(|e| CoreError::api(PROVIDER, format!("Malformed headlines payload: {e}")))?;

    if parsed.status.as_deref() == Some("error") {
        return Err(CoreError::api(
            PROVIDER,
            parsed.message.unwrap_or_else(|| "Unknown error".into()),
        ));
    }

    Ok(parsed
        .articles
        .into_iter()
        .filter_map(|a| {
            Some(NewsArticle {
                title: a.title?,
                url: a.url?,
                description: a.description.unwrap_or_default(),
                image_url: a.url_to_image,
                source_name: a.source.and_then(|s| s.name).unwrap_or_default(),
            })
        })
        .collect())
}

#[async_trait]
impl HeadlineSource for NewsApiProvider {
    async fn top_headlines(&self) -> Result<Vec<NewsArticle>, CoreError> {
        let payload = self.top_headlines_raw().await?;
        parse_headlines(payload)
    }
}
