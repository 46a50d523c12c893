use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier, used as the storage scope of the user's ledgers
    pub uid: String,
    pub email: String,
}

/// Identity transition published by the session to every subscribed ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::SignedIn(user) => write!(f, "user signed in: uid={}", user.uid),
            SessionEvent::SignedOut => write!(f, "user signed out"),
        }
    }
}

/// Key of an entry inside a ledger: ticker for holdings, UUID for entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Ticker(String),
    Id(Uuid),
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKey::Ticker(t) => write!(f, "{t}"),
            EntryKey::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Change notification delivered to ledger observers after each mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// Entries replaced from storage for a newly signed-in user
    Loaded { count: usize },
    Added(EntryKey),
    Updated(EntryKey),
    Removed(EntryKey),
    /// Quote fields of a holding changed
    Refreshed(EntryKey),
    /// Every entry dropped (sign-out or explicit clear)
    Cleared,
    /// Loading flag toggled
    Loading(bool),
}
