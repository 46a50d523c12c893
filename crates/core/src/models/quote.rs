use serde::{Deserialize, Serialize};

/// A normalized stock quote. Ephemeral: produced by a provider call and
/// merged into a `Holding`, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    /// Absolute change since the previous close
    pub change: f64,
    #[serde(rename = "changesPercentage")]
    pub changes_percentage: f64,
}

/// A candidate returned by a symbol search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
}

/// A business headline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: String,
}
