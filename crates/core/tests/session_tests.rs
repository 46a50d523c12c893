// ═══════════════════════════════════════════════════════════════════
// Session Tests: local identity provider, SessionState, ledger
// coupling through session events
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

use finance_tracker_core::clock::ManualClock;
use finance_tracker_core::config::RefreshPolicy;
use finance_tracker_core::errors::{AuthError, CoreError};
use finance_tracker_core::identity::credentials::KdfParams;
use finance_tracker_core::identity::local::LocalIdentityProvider;
use finance_tracker_core::identity::IdentityProvider;
use finance_tracker_core::models::entry::NewExpense;
use finance_tracker_core::models::event::{LedgerChange, SessionEvent, User};
use finance_tracker_core::models::holding::{Holding, NewHolding};
use finance_tracker_core::models::quote::Quote;
use finance_tracker_core::providers::traits::QuoteProvider;
use finance_tracker_core::services::entry_ledger::ExpenseLedger;
use finance_tracker_core::services::investment_ledger::{InvestmentLedger, STORAGE_KEY};
use finance_tracker_core::services::session_service::{follow_session, SessionListener, SessionState};
use finance_tracker_core::storage::manager::StorageManager;
use finance_tracker_core::storage::memory::MemoryStorage;
use finance_tracker_core::storage::Storage;

const WAIT: Duration = Duration::from_secs(5);

fn fast_params() -> KdfParams {
    KdfParams {
        memory_cost: 64,
        time_cost: 1,
        parallelism: 1,
    }
}

fn provider(storage: Arc<MemoryStorage>) -> Arc<LocalIdentityProvider> {
    Arc::new(LocalIdentityProvider::open(storage).unwrap().with_kdf_params(fast_params()))
}

fn user(uid: &str) -> User {
    User {
        uid: uid.into(),
        email: format!("{uid}@example.com"),
    }
}

async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

// ── Local identity provider ─────────────────────────────────────────

mod identity {
    use super::*;

    #[tokio::test]
    async fn sign_up_signs_in_and_normalizes_email() {
        let idp = provider(Arc::new(MemoryStorage::new()));

        let user = idp.sign_up("  Ana@Example.COM ", "hunter22").await.unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert!(!user.uid.is_empty());
        assert_eq!(idp.current_user(), Some(user));
    }

    #[tokio::test]
    async fn rejects_weak_password() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        let err = idp.sign_up("a@b.co", "12345").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::WeakPassword(6))));
        assert!(idp.current_user().is_none());
    }

    #[tokio::test]
    async fn rejects_malformed_email() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        for email in ["plainaddress", "@example.com", "ana@"] {
            let err = idp.sign_up(email, "hunter22").await.unwrap_err();
            assert!(matches!(err, CoreError::Auth(AuthError::InvalidEmail(_))), "{email}");
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_email() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        idp.sign_up("a@b.co", "hunter22").await.unwrap();

        let err = idp.sign_up("A@B.CO", "other-pass").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::EmailInUse(_))));
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        let created = idp.sign_up("a@b.co", "hunter22").await.unwrap();
        idp.sign_out().await.unwrap();

        let err = idp.sign_in("a@b.co", "hunter23").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));
        let err = idp.sign_in("nobody@b.co", "hunter22").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));

        let signed_in = idp.sign_in("a@b.co", "hunter22").await.unwrap();
        assert_eq!(signed_in, created);
    }

    #[tokio::test]
    async fn session_survives_reopen() {
        let storage = Arc::new(MemoryStorage::new());
        let created = provider(storage.clone()).sign_up("a@b.co", "hunter22").await.unwrap();

        let reopened = provider(storage.clone());
        assert_eq!(reopened.current_user(), Some(created));

        reopened.sign_out().await.unwrap();
        assert!(provider(storage).current_user().is_none());
    }

    #[tokio::test]
    async fn passwords_are_not_stored_in_clear() {
        let storage = Arc::new(MemoryStorage::new());
        provider(storage.clone()).sign_up("a@b.co", "hunter22-unique").await.unwrap();

        let blob = storage.load("_identity", "accounts").unwrap().unwrap();
        assert!(blob.contains("a@b.co"));
        assert!(!blob.contains("hunter22-unique"));
    }

    /// Memory storage whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStorage {
        inner: MemoryStorage,
        fail_saves: AtomicBool,
    }

    impl Storage for FlakyStorage {
        fn load(&self, scope: &str, key: &str) -> Result<Option<String>, CoreError> {
            self.inner.load(scope, key)
        }

        fn save(&self, scope: &str, key: &str, blob: &str) -> Result<(), CoreError> {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(CoreError::Storage("disk full".into()));
            }
            self.inner.save(scope, key, blob)
        }

        fn remove(&self, scope: &str, key: &str) -> Result<(), CoreError> {
            self.inner.remove(scope, key)
        }
    }

    #[tokio::test]
    async fn failed_sign_up_leaves_no_account_behind() {
        let storage = Arc::new(FlakyStorage::default());
        let idp = LocalIdentityProvider::open(storage.clone())
            .unwrap()
            .with_kdf_params(fast_params());

        storage.fail_saves.store(true, Ordering::SeqCst);
        let err = idp.sign_up("b@x.io", "hunter22").await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert!(idp.current_user().is_none());
        let err = idp.sign_in("b@x.io", "hunter22").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));

        storage.fail_saves.store(false, Ordering::SeqCst);
        let created = idp.sign_up("b@x.io", "hunter22").await.unwrap();

        let reopened = LocalIdentityProvider::open(storage).unwrap();
        reopened.sign_out().await.unwrap();
        assert_eq!(reopened.sign_in("b@x.io", "hunter22").await.unwrap(), created);
    }

    #[tokio::test]
    async fn change_stream_reports_sign_in_and_out() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        let mut rx = idp.subscribe();
        assert!(rx.borrow_and_update().is_none());

        idp.sign_up("a@b.co", "hunter22").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        idp.sign_out().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_none());
    }
}

// ── SessionState ────────────────────────────────────────────────────

mod session_state {
    use super::*;

    #[test]
    fn apply_publishes_only_identity_changes() {
        let session = SessionState::new(provider(Arc::new(MemoryStorage::new())));
        let mut rx = session.subscribe();
        assert!(!session.is_ready());

        session.apply(None);
        assert!(session.is_ready());
        assert!(rx.try_recv().is_err(), "nobody → nobody is not a transition");

        session.apply(Some(user("u1")));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedIn(user("u1")));

        session.apply(Some(user("u1")));
        assert!(rx.try_recv().is_err(), "same uid is not a transition");

        session.apply(Some(user("u2")));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedIn(user("u2")));

        session.apply(None);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::SignedOut);
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn listener_tracks_provider() {
        let idp = provider(Arc::new(MemoryStorage::new()));
        let session = Arc::new(SessionState::new(idp.clone()));
        let mut rx = session.subscribe();

        let _listener = session.listen_for_auth_state();
        tokio::time::timeout(WAIT, session.wait_until_ready()).await.unwrap();
        assert!(session.user().is_none());

        let created = session.sign_up("a@b.co", "hunter22").await.unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::SignedIn(created.clone()));
        assert_eq!(session.user(), Some(created));

        session.log_out().await.unwrap();
        assert_eq!(next_event(&mut rx).await, SessionEvent::SignedOut);
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn restored_session_is_announced_on_start() {
        let storage = Arc::new(MemoryStorage::new());
        let created = provider(storage.clone()).sign_up("a@b.co", "hunter22").await.unwrap();

        let session = Arc::new(SessionState::new(provider(storage)));
        let mut rx = session.subscribe();
        let _listener = session.listen_for_auth_state();

        assert_eq!(next_event(&mut rx).await, SessionEvent::SignedIn(created));
        assert!(session.is_ready());
    }

    #[tokio::test]
    async fn failures_propagate_unmodified() {
        let session = SessionState::new(provider(Arc::new(MemoryStorage::new())));
        let err = session.log_in("a@b.co", "whatever").await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(AuthError::InvalidCredentials)));
        let err = session.sign_up("a@b.co", "123").await.unwrap_err();
        assert_eq!(err.to_string(), "Password should be at least 6 characters");
    }
}

// ── Session → ledger coupling ───────────────────────────────────────

mod coupling {
    use super::*;

    /// Records every event it is handed.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<SessionEvent>>,
    }

    #[async_trait]
    impl SessionListener for Recorder {
        fn listener_name(&self) -> &'static str {
            "recorder"
        }

        async fn on_session_event(&self, event: &SessionEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[tokio::test]
    async fn follow_session_delivers_in_order_and_ends_with_session() {
        let session = SessionState::new(provider(Arc::new(MemoryStorage::new())));
        let recorder = Arc::new(Recorder::default());
        let task = follow_session(recorder.clone(), session.subscribe());

        session.apply(Some(user("u1")));
        session.apply(None);
        session.apply(Some(user("u2")));
        drop(session);

        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(
            *recorder.events.lock().unwrap(),
            [
                SessionEvent::SignedIn(user("u1")),
                SessionEvent::SignedOut,
                SessionEvent::SignedIn(user("u2")),
            ]
        );
    }

    /// Never answers.
    struct HangingQuotes {
        entered: Notify,
    }

    #[async_trait]
    impl QuoteProvider for HangingQuotes {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn fetch_quote(&self, _symbol: &str) -> Result<Quote, CoreError> {
            self.entered.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn sign_out_interrupts_a_running_sign_in_refresh() {
        let storage = Arc::new(MemoryStorage::new());
        let seed: Vec<Holding> = ["AAPL", "MSFT", "TSLA"]
            .into_iter()
            .map(|id| Holding::new(id, id, 1.0, 10.0, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
            .collect();
        StorageManager::save_entries(&*storage, "u1", STORAGE_KEY, &seed).unwrap();

        let quotes = Arc::new(HangingQuotes { entered: Notify::new() });
        let ledger = Arc::new(InvestmentLedger::new(
            storage.clone(),
            quotes.clone(),
            Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap())),
            RefreshPolicy::default(),
        ));
        let (tx, mut changes) = mpsc::unbounded_channel();
        ledger.subscribe(move |c| {
            let _ = tx.send(c.clone());
        });

        let session = SessionState::new(provider(storage.clone()));
        let _follower = follow_session(ledger.clone(), session.subscribe());

        session.apply(Some(user("u1")));
        tokio::time::timeout(WAIT, quotes.entered.notified()).await.unwrap();
        assert_eq!(ledger.owner().as_deref(), Some("u1"));
        assert!(ledger.is_loading());

        session.apply(None);
        tokio::time::timeout(WAIT, async {
            while let Some(change) = changes.recv().await {
                if change == LedgerChange::Cleared {
                    return;
                }
            }
        })
        .await
        .expect("sign-out was held up by the refresh");

        assert!(ledger.owner().is_none());
        assert!(ledger.is_empty());
        assert!(!ledger.is_loading());
        assert!(matches!(
            ledger.insert_holding(NewHolding::new("ZZZ", "Late", 1.0, 1.0)),
            Err(CoreError::NotSignedIn)
        ));
        let persisted: Vec<Holding> = StorageManager::load_entries(&*storage, "u1", STORAGE_KEY).unwrap();
        assert_eq!(persisted, seed);
    }

    #[tokio::test]
    async fn ledger_loads_on_sign_in_and_clears_on_sign_out() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap()));

        // seed u1's expenses directly
        let seed = ExpenseLedger::new(storage.clone(), clock.clone());
        seed.load_for("u1").unwrap();
        seed.add(NewExpense::new("Rent", 1000.0, "Housing", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
            .unwrap();

        let ledger = Arc::new(ExpenseLedger::new(storage.clone(), clock));
        let (tx, mut changes) = mpsc::unbounded_channel();
        ledger.subscribe(move |c| {
            let _ = tx.send(c.clone());
        });

        let session = SessionState::new(provider(storage));
        let _follower = follow_session(ledger.clone(), session.subscribe());

        session.apply(Some(user("u1")));
        let change = tokio::time::timeout(WAIT, changes.recv()).await.unwrap().unwrap();
        assert_eq!(change, LedgerChange::Loaded { count: 1 });
        assert_eq!(ledger.owner().as_deref(), Some("u1"));

        session.apply(None);
        let change = tokio::time::timeout(WAIT, changes.recv()).await.unwrap().unwrap();
        assert_eq!(change, LedgerChange::Cleared);
        assert!(ledger.is_empty());
    }
}
