use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::alphavantage::AlphaVantageProvider;
use super::fmp::FmpProvider;
use super::routing::{QuoteRoute, QuoteRouter};
use super::traits::QuoteProvider;
use crate::config::{Settings, ALPHA_VANTAGE_KEY, FMP_KEY};
use crate::errors::CoreError;
use crate::models::quote::Quote;

/// Registry of quote providers, one per route.
///
/// Requests are dispatched by the `QuoteRouter`; new providers are added by
/// registering them under a route and adding a rule, without touching callers.
pub struct QuoteProviderRegistry {
    router: QuoteRouter,
    providers: HashMap<QuoteRoute, Box<dyn QuoteProvider>>,
}

impl QuoteProviderRegistry {
    /// Create an empty registry using `router`.
    pub fn new(router: QuoteRouter) -> Self {
        Self {
            router,
            providers: HashMap::new(),
        }
    }

    /// Create a registry with the default router and both default providers.
    /// Providers are registered even without a key; a missing key is
    /// reported per request.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new(QuoteRouter::default());

        // FMP: plain tickers
        registry.register(
            QuoteRoute::Primary,
            Box::new(FmpProvider::new(
                settings.endpoints.fmp.clone(),
                settings.api_key(FMP_KEY).map(str::to_string),
            )),
        );

        // Alpha Vantage: exchange-suffixed tickers
        registry.register(
            QuoteRoute::Secondary,
            Box::new(AlphaVantageProvider::new(
                settings.endpoints.alpha_vantage.clone(),
                settings.api_key(ALPHA_VANTAGE_KEY).map(str::to_string),
            )),
        );

        registry
    }

    /// Register (or replace) the provider serving `route`.
    pub fn register(&mut self, route: QuoteRoute, provider: Box<dyn QuoteProvider>) {
        self.providers.insert(route, provider);
    }

    pub fn router(&self) -> &QuoteRouter {
        &self.router
    }

    /// The provider that would serve `symbol`.
    pub fn provider_for(&self, symbol: &str) -> Option<&dyn QuoteProvider> {
        self.providers
            .get(&self.router.route(symbol))
            .map(|p| p.as_ref())
    }
}

#[async_trait]
impl QuoteProvider for QuoteProviderRegistry {
    fn name(&self) -> &str {
        "router"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let route = self.router.route(symbol);
        let provider = self
            .providers
            .get(&route)
            .ok_or_else(|| CoreError::api("router", format!("No {route} quote provider registered")))?;
        debug!(symbol, %route, provider = provider.name(), "Routing quote request");
        provider.fetch_quote(symbol).await
    }
}
