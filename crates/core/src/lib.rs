pub mod clock;
pub mod config;
pub mod errors;
pub mod identity;
pub mod models;
pub mod providers;
pub mod proxy;
pub mod services;
pub mod storage;

use chrono::NaiveDate;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use clock::{Clock, SystemClock};
use config::Settings;
use errors::CoreError;
use identity::IdentityProvider;
use models::analytics::DashboardSummary;
use providers::traits::{HeadlineSource, QuoteProvider};
use services::entry_ledger::{ExpenseLedger, IncomeLedger};
use services::investment_ledger::InvestmentLedger;
use services::news_service::NewsFeed;
use services::session_service::{follow_session, SessionState};
use storage::Storage;

/// Main entry point for the finance tracker core library.
///
/// Wires the session to the three ledgers and the news feed. Ledgers are
/// coupled to the session only through `SessionEvent`s: `start()` hands each
/// one its own subscription before the auth listener begins.
#[must_use]
pub struct FinanceTracker {
    settings: Settings,
    clock: Arc<dyn Clock>,
    session: Arc<SessionState>,
    investments: Arc<InvestmentLedger>,
    expenses: Arc<ExpenseLedger>,
    income: Arc<IncomeLedger>,
    news: NewsFeed,
}

impl std::fmt::Debug for FinanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceTracker")
            .field("user", &self.session.user().map(|u| u.uid))
            .field("holdings", &self.investments.len())
            .field("expenses", &self.expenses.len())
            .field("income", &self.income.len())
            .field("proxy", &self.settings.proxy_url)
            .finish()
    }
}

impl FinanceTracker {
    pub fn new(
        settings: Settings,
        storage: Arc<dyn Storage>,
        identity: Arc<dyn IdentityProvider>,
        quotes: Arc<dyn QuoteProvider>,
        news: Arc<dyn HeadlineSource>,
    ) -> Self {
        Self::with_clock(settings, storage, identity, quotes, news, Arc::new(SystemClock))
    }

    pub fn with_clock(
        settings: Settings,
        storage: Arc<dyn Storage>,
        identity: Arc<dyn IdentityProvider>,
        quotes: Arc<dyn QuoteProvider>,
        news: Arc<dyn HeadlineSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let investments = InvestmentLedger::new(
            Arc::clone(&storage),
            quotes,
            Arc::clone(&clock),
            settings.refresh,
        );
        let expenses = ExpenseLedger::new(Arc::clone(&storage), Arc::clone(&clock));
        let income = IncomeLedger::new(storage, Arc::clone(&clock));

        Self {
            settings,
            clock,
            session: Arc::new(SessionState::new(identity)),
            investments: Arc::new(investments),
            expenses: Arc::new(expenses),
            income: Arc::new(income),
            news: NewsFeed::new(news),
        }
    }

    /// Subscribe every ledger to session events, then start listening to
    /// the identity provider. Must be called inside a Tokio runtime.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let handles = vec![
            follow_session(Arc::clone(&self.investments), self.session.subscribe()),
            follow_session(Arc::clone(&self.expenses), self.session.subscribe()),
            follow_session(Arc::clone(&self.income), self.session.subscribe()),
            self.session.listen_for_auth_state(),
        ];
        info!("Finance tracker started");
        handles
    }

    /// Load every ledger for `uid` without refreshing quotes.
    /// For one-shot callers that do not run the session listeners.
    pub fn load_for(&self, uid: &str) -> Result<(), CoreError> {
        self.investments.load_for(uid)?;
        self.expenses.load_for(uid)?;
        self.income.load_for(uid)?;
        Ok(())
    }

    /// Today's date on the tracker's clock. Default date for new entries,
    /// so they land in the month the ledgers call "this month".
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn investments(&self) -> &Arc<InvestmentLedger> {
        &self.investments
    }

    pub fn expenses(&self) -> &Arc<ExpenseLedger> {
        &self.expenses
    }

    pub fn income(&self) -> &Arc<IncomeLedger> {
        &self.income
    }

    pub fn news(&self) -> &NewsFeed {
        &self.news
    }

    /// Portfolio aggregates plus this month's cash flow.
    #[must_use]
    pub fn dashboard(&self) -> DashboardSummary {
        let expenses_this_month = self.expenses.total_this_month();
        let income_this_month = self.income.total_this_month();
        DashboardSummary {
            as_of_date: self.clock.today(),
            portfolio: self.investments.summary(),
            expenses_this_month,
            income_this_month,
            net_cash_flow_this_month: income_this_month - expenses_this_month,
        }
    }
}
