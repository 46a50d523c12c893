use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::{NewsArticle, Quote, SymbolMatch};

/// Trait abstraction for every quote source.
///
/// Each upstream API (FMP, Alpha Vantage, a deployed proxy) implements this
/// trait. Replacing a provider touches only its implementation; the ledger
/// only ever sees `dyn QuoteProvider`.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the latest quote for a ticker. A single attempt, never retried.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, CoreError>;
}

/// Free-text symbol lookup.
#[async_trait]
pub trait SymbolSearch: Send + Sync {
    /// Candidate matches for `keyword`; empty when upstream has none.
    async fn search(&self, keyword: &str) -> Result<Vec<SymbolMatch>, CoreError>;
}

/// Top business headlines.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn top_headlines(&self) -> Result<Vec<NewsArticle>, CoreError>;
}
