use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::quote::Quote;

/// A single tracked investment position.
///
/// The `id` is the ticker symbol, uppercased, and is unique within a
/// user's holding set. Quote fields are optional: they are filled by a
/// refresh and cleared again before the next upstream call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol, uppercased (e.g., "AAPL", "VUAA.L")
    pub id: String,

    /// Human-readable name (e.g., "Apple Inc.")
    pub name: String,

    pub shares: f64,

    /// Price paid per share
    pub purchase_price: f64,

    /// Latest quoted price, if a refresh succeeded
    #[serde(default)]
    pub current_price: Option<f64>,

    /// Absolute change per share since the previous close
    #[serde(default)]
    pub daily_change: Option<f64>,

    #[serde(default)]
    pub daily_change_percent: Option<f64>,

    /// Message of the last failed refresh
    #[serde(default)]
    pub error: Option<String>,

    /// When the last successful quote was written
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,

    /// Calendar day the holding was added
    pub date_added: NaiveDate,
}

impl Holding {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        shares: f64,
        purchase_price: f64,
        date_added: NaiveDate,
    ) -> Self {
        Self {
            id: id.into().trim().to_uppercase(),
            name: name.into(),
            shares,
            purchase_price,
            current_price: None,
            daily_change: None,
            daily_change_percent: None,
            error: None,
            last_fetched: None,
            date_added,
        }
    }

    /// Case-insensitive identifier match.
    pub fn matches(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id.trim())
    }

    /// shares × purchase price
    pub fn cost_basis(&self) -> f64 {
        self.shares * self.purchase_price
    }

    /// shares × live price, falling back to the purchase price when no quote is available.
    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price.unwrap_or(self.purchase_price)
    }

    /// shares × daily change, or `None` without a daily change.
    pub fn today_gain_loss(&self) -> Option<f64> {
        self.daily_change.map(|change| self.shares * change)
    }

    /// A quote fetched less than `ttl` ago is still fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_fetched.is_some_and(|fetched| now - fetched < ttl)
    }

    /// Reset every quote-derived field ahead of an upstream call.
    pub fn clear_quote(&mut self) {
        self.current_price = None;
        self.daily_change = None;
        self.daily_change_percent = None;
        self.error = None;
    }

    pub fn apply_quote(&mut self, quote: &Quote, fetched_at: DateTime<Utc>) {
        self.current_price = Some(quote.price);
        self.daily_change = Some(quote.change);
        self.daily_change_percent = Some(quote.changes_percentage);
        self.error = None;
        self.last_fetched = Some(fetched_at);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.current_price = None;
        self.daily_change = None;
        self.daily_change_percent = None;
        self.error = Some(message.into());
    }
}

/// Caller input for adding a holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHolding {
    pub id: String,
    pub name: String,
    pub shares: f64,
    pub purchase_price: f64,
}

impl NewHolding {
    pub fn new(id: impl Into<String>, name: impl Into<String>, shares: f64, purchase_price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            shares,
            purchase_price,
        }
    }
}
