use async_trait::async_trait;
use chrono::Datelike;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::models::entry::{Expense, Income, LedgerEntry};
use crate::models::event::{EntryKey, LedgerChange, SessionEvent};
use crate::services::analytics_service::AnalyticsService;
use crate::services::notifier::ChangeNotifier;
use crate::services::session_service::SessionListener;
use crate::storage::manager::StorageManager;
use crate::storage::Storage;

pub type ExpenseLedger = EntryLedger<Expense>;
pub type IncomeLedger = EntryLedger<Income>;

struct EntryState<E> {
    owner: Option<String>,
    entries: Vec<E>,
}

/// Flat list of dated monetary entries for the signed-in user.
///
/// Expenses and income share this implementation; the entry type decides
/// the storage key and the shape of a record.
pub struct EntryLedger<E: LedgerEntry> {
    state: Mutex<EntryState<E>>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    notifier: ChangeNotifier,
}

impl<E: LedgerEntry> EntryLedger<E> {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(EntryState {
                owner: None,
                entries: Vec::new(),
            }),
            storage,
            clock,
            notifier: ChangeNotifier::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryState<E>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &EntryState<E>) -> Result<(), CoreError> {
        let scope = state.owner.as_deref().ok_or(CoreError::NotSignedIn)?;
        StorageManager::save_entries(self.storage.as_ref(), scope, E::STORAGE_KEY, &state.entries)
    }

    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&LedgerChange) + Send + Sync + 'static,
    {
        self.notifier.subscribe(observer);
    }

    /// Replace the in-memory entries with those stored for `uid`.
    pub fn load_for(&self, uid: &str) -> Result<usize, CoreError> {
        let entries: Vec<E> = StorageManager::load_entries(self.storage.as_ref(), uid, E::STORAGE_KEY)?;
        let count = entries.len();
        {
            let mut state = self.lock();
            state.owner = Some(uid.to_string());
            state.entries = entries;
        }
        info!(ledger = E::STORAGE_KEY, uid, count, "Entries loaded");
        self.notifier.notify(LedgerChange::Loaded { count });
        Ok(count)
    }

    pub fn clear_store(&self) {
        {
            let mut state = self.lock();
            state.owner = None;
            state.entries.clear();
        }
        self.notifier.notify(LedgerChange::Cleared);
    }

    /// Record a new entry with a fresh identifier, newest first.
    pub fn add(&self, draft: E::Draft) -> Result<E, CoreError> {
        let amount = E::draft_amount(&draft);
        if !amount.is_finite() || amount < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Amount must be a non-negative number, got {amount}"
            )));
        }

        let entry = E::from_draft(Uuid::new_v4(), draft);
        {
            let mut state = self.lock();
            if state.owner.is_none() {
                return Err(CoreError::NotSignedIn);
            }
            state.entries.insert(0, entry.clone());
            if let Err(e) = self.persist(&state) {
                state.entries.remove(0);
                return Err(e);
            }
        }

        info!(ledger = E::STORAGE_KEY, id = %entry.id(), amount, "Entry added");
        self.notifier.notify(LedgerChange::Added(EntryKey::Id(entry.id())));
        Ok(entry)
    }

    /// Remove an entry. Returns `false` (and does nothing) when none matches.
    pub fn delete(&self, id: Uuid) -> Result<bool, CoreError> {
        {
            let mut state = self.lock();
            let Some(idx) = state.entries.iter().position(|e| e.id() == id) else {
                return Ok(false);
            };
            let removed = state.entries.remove(idx);
            if let Err(e) = self.persist(&state) {
                state.entries.insert(idx, removed);
                return Err(e);
            }
        }
        info!(ledger = E::STORAGE_KEY, %id, "Entry deleted");
        self.notifier.notify(LedgerChange::Removed(EntryKey::Id(id)));
        Ok(true)
    }

    pub fn entries(&self) -> Vec<E> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owner(&self) -> Option<String> {
        self.lock().owner.clone()
    }

    /// Sum of amounts keyed by "YYYY-MM".
    pub fn amount_by_month(&self) -> BTreeMap<String, f64> {
        AnalyticsService::amount_by_month(&self.lock().entries)
    }

    pub fn total_in_month(&self, year: i32, month: u32) -> f64 {
        AnalyticsService::total_in_month(&self.lock().entries, year, month)
    }

    /// Sum of amounts dated in the clock's current month.
    pub fn total_this_month(&self) -> f64 {
        let today = self.clock.today();
        self.total_in_month(today.year(), today.month())
    }
}

#[async_trait]
impl<E: LedgerEntry> SessionListener for EntryLedger<E> {
    fn listener_name(&self) -> &'static str {
        E::STORAGE_KEY
    }

    async fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SignedIn(user) => {
                if let Err(e) = self.load_for(&user.uid) {
                    error!(ledger = E::STORAGE_KEY, uid = %user.uid, error = %e, "Failed to load entries");
                }
            }
            SessionEvent::SignedOut => self.clear_store(),
        }
    }
}
