use thiserror::Error;

/// Unified error type for the entire finance-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ───────────────────────────────────────────────
    /// A provider secret is absent at request time. Fatal to the request only.
    #[error("{0} key is missing.")]
    MissingSecret(String),

    #[error("{0} is required.")]
    MissingParameter(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("{provider} API limit reached.")]
    RateLimited { provider: String },

    #[error("Network error: {0}")]
    Network(String),

    // ── Identity ────────────────────────────────────────────────────
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("No user is signed in")]
    NotSignedIn,

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Holding {0} is already in the portfolio")]
    DuplicateHolding(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ── Storage ─────────────────────────────────────────────────────
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Failures reported by an identity provider. Surfaced to the caller as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("An account already exists for {0}")]
    EmailInUse(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password should be at least {0} characters")]
    WeakPassword(usize),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Credential derivation failed: {0}")]
    Credential(String),
}

impl CoreError {
    /// Shorthand for an upstream failure attributed to `provider`.
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // Every provider passes its key as a query parameter, so the query
        // string must never reach logs or user-visible messages.
        CoreError::Network(redact_query(&e.to_string()))
    }
}

/// Strip everything after the first `?` in a message that may contain a URL.
pub(crate) fn redact_query(msg: &str) -> String {
    match msg.find('?') {
        Some(idx) => {
            let tail = &msg[idx..];
            // keep whatever follows the URL (reqwest appends ")" or a reason)
            let end = tail
                .find(|c: char| c.is_whitespace() || c == ')')
                .unwrap_or(tail.len());
            format!("{}?<query redacted>{}", &msg[..idx], &tail[end..])
        }
        None => msg.to_string(),
    }
}
