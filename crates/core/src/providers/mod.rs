pub mod registry;
pub mod routing;
pub mod traits;

// API provider implementations
pub mod alphavantage;
pub mod fmp;
pub mod newsapi;
pub mod proxy_client;

use reqwest::Client;
use std::time::Duration;

/// Shared client configuration for every upstream call.
pub(crate) fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("finance-tracker/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}
