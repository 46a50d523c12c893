use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Year-month bucket of a calendar day, e.g. `2024-03-15` → `"2024-03"`.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Aggregates over the current holding list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    /// Σ shares × purchase price
    pub total_cost: f64,

    /// Σ shares × (live price, else purchase price)
    pub current_value: f64,

    /// current_value − total_cost
    pub total_gain_loss: f64,

    /// Percentage return: (total_gain_loss / total_cost) × 100, 0 for an empty portfolio
    pub total_return_pct: f64,

    /// Σ shares × daily change over holdings that have one
    pub today_gain_loss: f64,

    /// Cost basis bucketed by the year-month of each holding's acquisition date
    pub cost_by_month: BTreeMap<String, f64>,

    /// Number of holdings whose last refresh failed
    pub holdings_with_errors: usize,
}

/// Everything the dashboard view needs in one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub as_of_date: NaiveDate,
    pub portfolio: PortfolioSummary,
    pub expenses_this_month: f64,
    pub income_this_month: f64,
    /// income_this_month − expenses_this_month
    pub net_cash_flow_this_month: f64,
}
