use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::RefreshPolicy;
use crate::errors::CoreError;
use crate::models::analytics::PortfolioSummary;
use crate::models::event::{EntryKey, LedgerChange, SessionEvent};
use crate::models::holding::{Holding, NewHolding};
use crate::models::quote::Quote;
use crate::providers::traits::QuoteProvider;
use crate::services::analytics_service::AnalyticsService;
use crate::services::notifier::ChangeNotifier;
use crate::services::session_service::SessionListener;
use crate::storage::manager::StorageManager;
use crate::storage::Storage;

/// Storage key of the holdings blob.
pub const STORAGE_KEY: &str = "investments";

/// Result of refreshing one holding.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Fetched within the cache window; no upstream call was made
    Fresh,
    Updated(Quote),
    /// The upstream call failed; the message is recorded on the holding
    Failed(String),
    NotFound,
    /// The ledger was cleared or reloaded while the call was in flight;
    /// nothing was written
    Discarded,
}

impl RefreshOutcome {
    /// Whether an upstream call was issued.
    pub fn issued_request(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Updated(_) | RefreshOutcome::Failed(_) | RefreshOutcome::Discarded
        )
    }
}

/// Per-holding outcomes of a batch refresh, in refresh order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub outcomes: Vec<(String, RefreshOutcome)>,
}

impl RefreshReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Updated(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Failed(_)))
    }

    pub fn fresh(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Fresh))
    }

    pub fn requests_issued(&self) -> usize {
        self.count(RefreshOutcome::issued_request)
    }

    fn count(&self, pred: impl Fn(&RefreshOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

#[derive(Default)]
struct LedgerState {
    /// Storage scope of the signed-in user
    owner: Option<String>,
    /// Bumped on every load and clear; quote results fetched under an
    /// older generation are discarded
    generation: u64,
    holdings: Vec<Holding>,
}

/// Holds the user's investment positions, computes valuation aggregates and
/// drives quote refresh with a staleness cache and a fixed inter-call pause.
///
/// The holding list sits behind a mutex that is never held across an
/// upstream call: a refresh snapshots what it needs, releases the lock,
/// awaits the provider, then re-locks to write the result.
pub struct InvestmentLedger {
    state: Mutex<LedgerState>,
    loading: AtomicBool,
    storage: Arc<dyn Storage>,
    quotes: Arc<dyn QuoteProvider>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    notifier: ChangeNotifier,
}

/// Clears the loading flag however the batch refresh ends.
struct LoadingGuard<'a> {
    ledger: &'a InvestmentLedger,
}

impl<'a> LoadingGuard<'a> {
    fn start(ledger: &'a InvestmentLedger) -> Self {
        ledger.loading.store(true, Ordering::SeqCst);
        ledger.notifier.notify(LedgerChange::Loading(true));
        Self { ledger }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.ledger.loading.store(false, Ordering::SeqCst);
        self.ledger.notifier.notify(LedgerChange::Loading(false));
    }
}

fn validate_amounts(shares: f64, purchase_price: f64) -> Result<(), CoreError> {
    if !shares.is_finite() || shares < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Share count must be a non-negative number, got {shares}"
        )));
    }
    if !purchase_price.is_finite() || purchase_price < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Purchase price must be a non-negative number, got {purchase_price}"
        )));
    }
    Ok(())
}

impl InvestmentLedger {
    pub fn new(
        storage: Arc<dyn Storage>,
        quotes: Arc<dyn QuoteProvider>,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            loading: AtomicBool::new(false),
            storage,
            quotes,
            clock,
            policy,
            notifier: ChangeNotifier::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &LedgerState) -> Result<(), CoreError> {
        let scope = state.owner.as_deref().ok_or(CoreError::NotSignedIn)?;
        StorageManager::save_entries(self.storage.as_ref(), scope, STORAGE_KEY, &state.holdings)
    }

    /// Quote writes are persisted opportunistically: a storage failure is
    /// logged and the in-memory result kept.
    fn persist_quietly(&self, state: &LedgerState) {
        if state.owner.is_none() {
            return;
        }
        if let Err(e) = self.persist(state) {
            warn!(error = %e, "Failed to persist refreshed holdings");
        }
    }

    // ── Observation ─────────────────────────────────────────────────

    /// Register an on-change observer.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&LedgerChange) + Send + Sync + 'static,
    {
        self.notifier.subscribe(observer);
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Replace the in-memory holdings with those stored for `uid`.
    pub fn load_for(&self, uid: &str) -> Result<usize, CoreError> {
        let holdings: Vec<Holding> =
            StorageManager::load_entries(self.storage.as_ref(), uid, STORAGE_KEY)?;
        let count = holdings.len();
        {
            let mut state = self.lock();
            state.owner = Some(uid.to_string());
            state.generation += 1;
            state.holdings = holdings;
        }
        info!(uid, count, "Holdings loaded");
        self.notifier.notify(LedgerChange::Loaded { count });
        Ok(count)
    }

    /// Drop all in-memory state (sign-out). Storage is untouched.
    pub fn clear_store(&self) {
        {
            let mut state = self.lock();
            state.owner = None;
            state.generation += 1;
            state.holdings.clear();
        }
        self.notifier.notify(LedgerChange::Cleared);
    }

    /// Delete every holding of the signed-in user in one write.
    /// Returns how many holdings were removed; 0 when already empty.
    pub fn clear_portfolio(&self) -> Result<usize, CoreError> {
        let removed = {
            let mut state = self.lock();
            if state.owner.is_none() {
                return Err(CoreError::NotSignedIn);
            }
            if state.holdings.is_empty() {
                return Ok(0);
            }
            let removed = std::mem::take(&mut state.holdings);
            if let Err(e) = self.persist(&state) {
                state.holdings = removed;
                return Err(e);
            }
            removed.len()
        };
        info!(removed, "Portfolio cleared");
        self.notifier.notify(LedgerChange::Cleared);
        Ok(removed)
    }

    // ── Mutations ───────────────────────────────────────────────────

    /// Add a holding dated today, then refresh its quote.
    ///
    /// Fails with `DuplicateHolding` if the identifier is already present
    /// (case-insensitively); the list is left unchanged in that case.
    pub async fn add_holding(&self, new: NewHolding) -> Result<RefreshOutcome, CoreError> {
        let id = self.insert_holding(new)?;
        Ok(self.refresh_one(&id).await)
    }

    /// The check-and-insert half of `add_holding`, performed in a single
    /// critical section so concurrent adds cannot both pass the check.
    pub fn insert_holding(&self, new: NewHolding) -> Result<String, CoreError> {
        validate_amounts(new.shares, new.purchase_price)?;
        let holding = Holding::new(
            new.id,
            new.name,
            new.shares,
            new.purchase_price,
            self.clock.today(),
        );
        if holding.id.is_empty() {
            return Err(CoreError::ValidationError("Ticker symbol must not be empty".into()));
        }
        let id = holding.id.clone();

        {
            let mut state = self.lock();
            if state.owner.is_none() {
                return Err(CoreError::NotSignedIn);
            }
            if state.holdings.iter().any(|h| h.matches(&id)) {
                return Err(CoreError::DuplicateHolding(id));
            }
            state.holdings.insert(0, holding);
            if let Err(e) = self.persist(&state) {
                state.holdings.remove(0);
                return Err(e);
            }
        }

        info!(id = %id, "Holding added");
        self.notifier.notify(LedgerChange::Added(EntryKey::Ticker(id.clone())));
        Ok(id)
    }

    /// Change share count and purchase price in place. Returns `false`
    /// (and does nothing) when no holding matches. Does not refresh.
    pub fn update_holding(&self, id: &str, shares: f64, purchase_price: f64) -> Result<bool, CoreError> {
        validate_amounts(shares, purchase_price)?;
        let key = {
            let mut state = self.lock();
            let Some(idx) = state.holdings.iter().position(|h| h.matches(id)) else {
                return Ok(false);
            };
            let previous = (state.holdings[idx].shares, state.holdings[idx].purchase_price);
            state.holdings[idx].shares = shares;
            state.holdings[idx].purchase_price = purchase_price;
            if let Err(e) = self.persist(&state) {
                (state.holdings[idx].shares, state.holdings[idx].purchase_price) = previous;
                return Err(e);
            }
            state.holdings[idx].id.clone()
        };
        info!(id = %key, shares, purchase_price, "Holding updated");
        self.notifier.notify(LedgerChange::Updated(EntryKey::Ticker(key)));
        Ok(true)
    }

    /// Remove a holding. Returns `false` (and does nothing) when none matches.
    pub fn delete_holding(&self, id: &str) -> Result<bool, CoreError> {
        let key = {
            let mut state = self.lock();
            let Some(idx) = state.holdings.iter().position(|h| h.matches(id)) else {
                return Ok(false);
            };
            let removed = state.holdings.remove(idx);
            if let Err(e) = self.persist(&state) {
                state.holdings.insert(idx, removed);
                return Err(e);
            }
            removed.id
        };
        info!(id = %key, "Holding deleted");
        self.notifier.notify(LedgerChange::Removed(EntryKey::Ticker(key)));
        Ok(true)
    }

    // ── Quote refresh ───────────────────────────────────────────────

    /// Refresh one holding's quote.
    ///
    /// 1. Fetched less than `cache_ttl` ago → no upstream call.
    /// 2. Otherwise quote fields and error are cleared and the routed
    ///    provider is called once.
    /// 3. Success writes price, change, percent change and `last_fetched`.
    /// 4. Failure leaves the quote empty and records the message. Not retried.
    pub async fn refresh_one(&self, id: &str) -> RefreshOutcome {
        let (symbol, generation) = {
            let mut state = self.lock();
            let generation = state.generation;
            let Some(holding) = state.holdings.iter_mut().find(|h| h.matches(id)) else {
                return RefreshOutcome::NotFound;
            };
            if holding.is_fresh(self.clock.now(), self.policy.cache_ttl) {
                debug!(id = %holding.id, "Quote still fresh, skipping upstream call");
                return RefreshOutcome::Fresh;
            }
            holding.clear_quote();
            (holding.id.clone(), generation)
        };

        let result = self.quotes.fetch_quote(&symbol).await;
        let fetched_at = self.clock.now();

        let outcome = {
            let mut state = self.lock();
            if state.generation != generation {
                debug!(id = %symbol, "Ledger reloaded or cleared while the quote was in flight");
                return RefreshOutcome::Discarded;
            }
            let Some(holding) = state.holdings.iter_mut().find(|h| h.id == symbol) else {
                debug!(id = %symbol, "Holding removed while its quote was in flight");
                return match result {
                    Ok(quote) => RefreshOutcome::Updated(quote),
                    Err(e) => RefreshOutcome::Failed(e.to_string()),
                };
            };
            let outcome = match result {
                Ok(quote) => {
                    holding.apply_quote(&quote, fetched_at);
                    RefreshOutcome::Updated(quote)
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(id = %symbol, error = %message, "Failed to fetch quote");
                    holding.record_error(message.clone());
                    RefreshOutcome::Failed(message)
                }
            };
            self.persist_quietly(&state);
            outcome
        };

        self.notifier.notify(LedgerChange::Refreshed(EntryKey::Ticker(symbol)));
        outcome
    }

    /// Refresh every holding sequentially, pausing `policy.spacing` before
    /// each upstream call after the first. One holding's failure never
    /// aborts the batch; the loading flag is cleared however it ends.
    /// The batch stops early once the ledger is cleared or reloaded.
    pub async fn refresh_all(&self) -> RefreshReport {
        let _loading = LoadingGuard::start(self);
        let (ids, generation) = {
            let state = self.lock();
            let ids: Vec<String> = state.holdings.iter().map(|h| h.id.clone()).collect();
            (ids, state.generation)
        };
        info!(count = ids.len(), "Refreshing all holdings");

        let mut report = RefreshReport::default();
        let mut called_upstream = false;
        for id in ids {
            if called_upstream && self.needs_refresh(&id) {
                tokio::time::sleep(self.policy.spacing).await;
            }
            if self.lock().generation != generation {
                debug!(remaining = %id, "Ledger changed hands, abandoning refresh");
                break;
            }
            let outcome = self.refresh_one(&id).await;
            called_upstream |= outcome.issued_request();
            report.outcomes.push((id, outcome));
        }

        debug!(
            updated = report.updated(),
            failed = report.failed(),
            fresh = report.fresh(),
            "Refresh finished"
        );
        report
    }

    fn needs_refresh(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .holdings
            .iter()
            .find(|h| h.matches(id))
            .is_some_and(|h| !h.is_fresh(now, self.policy.cache_ttl))
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Snapshot of the holdings, newest first.
    pub fn holdings(&self) -> Vec<Holding> {
        self.lock().holdings.clone()
    }

    pub fn get(&self, id: &str) -> Option<Holding> {
        self.lock().holdings.iter().find(|h| h.matches(id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while a batch refresh is running.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Storage scope of the signed-in user, if any.
    pub fn owner(&self) -> Option<String> {
        self.lock().owner.clone()
    }

    // ── Aggregates ──────────────────────────────────────────────────

    pub fn total_cost(&self) -> f64 {
        AnalyticsService::total_cost(&self.lock().holdings)
    }

    pub fn current_value(&self) -> f64 {
        AnalyticsService::current_value(&self.lock().holdings)
    }

    pub fn today_gain_loss(&self) -> f64 {
        AnalyticsService::today_gain_loss(&self.lock().holdings)
    }

    pub fn cost_by_month(&self) -> BTreeMap<String, f64> {
        AnalyticsService::cost_by_month(&self.lock().holdings)
    }

    pub fn summary(&self) -> PortfolioSummary {
        AnalyticsService::portfolio_summary(&self.lock().holdings)
    }
}

#[async_trait]
impl SessionListener for InvestmentLedger {
    fn listener_name(&self) -> &'static str {
        "investments"
    }

    /// Sign-in loads the user's holdings and refreshes their quotes;
    /// sign-out clears the in-memory list.
    async fn on_session_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::SignedIn(user) => match self.load_for(&user.uid) {
                Ok(_) => {
                    self.refresh_all().await;
                }
                Err(e) => error!(uid = %user.uid, error = %e, "Failed to load holdings"),
            },
            SessionEvent::SignedOut => self.clear_store(),
        }
    }
}
