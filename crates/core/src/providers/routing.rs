/// Which quote provider serves an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteRoute {
    /// Primary-market tickers (FMP)
    Primary,
    /// Global-markets tickers (Alpha Vantage)
    Secondary,
}

impl std::fmt::Display for QuoteRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteRoute::Primary => write!(f, "primary"),
            QuoteRoute::Secondary => write!(f, "secondary"),
        }
    }
}

/// A named predicate over ticker identifiers.
#[derive(Debug, Clone, Copy)]
pub struct RoutingRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub route: QuoteRoute,
}

fn has_exchange_suffix(symbol: &str) -> bool {
    symbol.contains('.')
}

/// Tickers carrying an exchange suffix ("VUAA.L", "SAP.DE") are not listed
/// on the primary market and go to the secondary provider.
pub const EXCHANGE_SUFFIX_RULE: RoutingRule = RoutingRule {
    name: "exchange-suffix",
    matches: has_exchange_suffix,
    route: QuoteRoute::Secondary,
};

/// Ordered routing rules; the first matching rule wins, otherwise the
/// fallback route applies.
#[derive(Debug, Clone)]
pub struct QuoteRouter {
    rules: Vec<RoutingRule>,
    fallback: QuoteRoute,
}

impl QuoteRouter {
    /// A router with no rules: everything goes to `fallback`.
    pub fn new(fallback: QuoteRoute) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn with_rule(mut self, rule: RoutingRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn route(&self, symbol: &str) -> QuoteRoute {
        self.matching_rule(symbol)
            .map(|r| r.route)
            .unwrap_or(self.fallback)
    }

    /// The rule that decided the route, if any did.
    pub fn matching_rule(&self, symbol: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| (r.matches)(symbol))
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }
}

impl Default for QuoteRouter {
    fn default() -> Self {
        Self::new(QuoteRoute::Primary).with_rule(EXCHANGE_SUFFIX_RULE)
    }
}
