use chrono::Duration;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Key under which the primary quote provider's secret is stored.
pub const FMP_KEY: &str = "fmp";
/// Key under which the secondary quote / search provider's secret is stored.
pub const ALPHA_VANTAGE_KEY: &str = "alphavantage";
/// Key under which the news provider's secret is stored.
pub const NEWS_API_KEY: &str = "newsapi";

/// Environment variable → `api_keys` entry.
const SECRET_VARS: [(&str, &str); 3] = [
    ("FMP_API_KEY", FMP_KEY),
    ("ALPHA_VANTAGE_API_KEY", ALPHA_VANTAGE_KEY),
    ("NEWS_API_KEY", NEWS_API_KEY),
];

/// Base URLs of the upstream providers. Overridable so tests can point
/// providers at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub fmp: String,
    pub alpha_vantage: String,
    pub news_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            fmp: "https://financialmodelingprep.com".to_string(),
            alpha_vantage: "https://www.alphavantage.co".to_string(),
            news_api: "https://newsapi.org".to_string(),
        }
    }
}

/// Identity-provider project credentials. Only a hosted identity backend
/// consumes these; the local provider ignores them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    pub api_key: Option<String>,
    pub project_id: Option<String>,
}

impl IdentityConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.project_id.is_some()
    }
}

/// Quote refresh policy. Both values are there to stay under free-tier
/// provider quotas; neither is derived from a provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// A holding fetched more recently than this is not re-queried
    pub cache_ttl: Duration,
    /// Pause between successive upstream calls in a batch refresh
    pub spacing: std::time::Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::minutes(15),
            spacing: std::time::Duration::from_secs(1),
        }
    }
}

/// Runtime settings: provider secrets, endpoints and refresh policy.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Provider secrets. Keys: `fmp`, `alphavantage`, `newsapi`.
    pub api_keys: HashMap<String, String>,

    pub identity: IdentityConfig,

    pub endpoints: Endpoints,

    /// Base URL of a deployed proxy; when set, clients go through it
    /// instead of calling providers directly.
    pub proxy_url: Option<String>,

    /// Where local state is kept (CLI default: the platform data dir)
    pub data_dir: Option<PathBuf>,

    pub refresh: RefreshPolicy,
}

impl Settings {
    /// Build settings from the process environment, loading a `.env` file
    /// first when one exists. Missing secrets are not an error here.
    pub fn from_env() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {e}"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut settings = Settings::default();
        for (var, key) in SECRET_VARS {
            if let Some(value) = get(var) {
                settings.api_keys.insert(key.to_string(), value);
            }
        }
        settings.identity = IdentityConfig {
            api_key: get("IDENTITY_API_KEY"),
            project_id: get("IDENTITY_PROJECT_ID"),
        };
        settings.proxy_url = get("FINANCE_PROXY_URL");
        settings.data_dir = get("FINANCE_DATA_DIR").map(PathBuf::from);

        debug!(
            configured = ?settings.api_keys.keys().collect::<Vec<_>>(),
            proxy = settings.proxy_url.is_some(),
            "Settings loaded"
        );
        settings
    }

    /// Secret for a provider, if configured.
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys.get(provider).map(String::as_str)
    }

    pub fn set_api_key(&mut self, provider: impl Into<String>, key: impl Into<String>) {
        self.api_keys.insert(provider.into(), key.into());
    }
}
