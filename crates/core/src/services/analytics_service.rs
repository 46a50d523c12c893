use chrono::Datelike;
use std::collections::BTreeMap;

use crate::models::analytics::{month_key, PortfolioSummary};
use crate::models::entry::LedgerEntry;
use crate::models::holding::Holding;

/// Derived aggregates over ledger contents.
///
/// Pure functions with no I/O, recomputed on every read.
pub struct AnalyticsService;

impl AnalyticsService {
    /// Σ shares × purchase price
    pub fn total_cost(holdings: &[Holding]) -> f64 {
        holdings.iter().map(Holding::cost_basis).sum()
    }

    /// Σ shares × (live price, else purchase price)
    pub fn current_value(holdings: &[Holding]) -> f64 {
        holdings.iter().map(Holding::market_value).sum()
    }

    /// Σ shares × daily change, over holdings that have a daily change.
    pub fn today_gain_loss(holdings: &[Holding]) -> f64 {
        holdings.iter().filter_map(Holding::today_gain_loss).sum()
    }

    /// Cost basis bucketed by the year-month of each acquisition date.
    pub fn cost_by_month(holdings: &[Holding]) -> BTreeMap<String, f64> {
        let mut buckets = BTreeMap::new();
        for holding in holdings {
            *buckets.entry(month_key(holding.date_added)).or_insert(0.0) += holding.cost_basis();
        }
        buckets
    }

    pub fn portfolio_summary(holdings: &[Holding]) -> PortfolioSummary {
        let total_cost = Self::total_cost(holdings);
        let current_value = Self::current_value(holdings);
        let total_gain_loss = current_value - total_cost;
        let total_return_pct = if total_cost > 0.0 {
            total_gain_loss / total_cost * 100.0
        } else {
            0.0
        };

        PortfolioSummary {
            total_cost,
            current_value,
            total_gain_loss,
            total_return_pct,
            today_gain_loss: Self::today_gain_loss(holdings),
            cost_by_month: Self::cost_by_month(holdings),
            holdings_with_errors: holdings.iter().filter(|h| h.error.is_some()).count(),
        }
    }

    /// Entry amounts bucketed by the year-month of their date.
    pub fn amount_by_month<E: LedgerEntry>(entries: &[E]) -> BTreeMap<String, f64> {
        let mut buckets = BTreeMap::new();
        for entry in entries {
            *buckets.entry(month_key(entry.date())).or_insert(0.0) += entry.amount();
        }
        buckets
    }

    /// Sum of the amounts dated in the given calendar month.
    pub fn total_in_month<E: LedgerEntry>(entries: &[E], year: i32, month: u32) -> f64 {
        entries
            .iter()
            .filter(|e| e.date().year() == year && e.date().month() == month)
            .map(|e| e.amount())
            .sum()
    }
}
