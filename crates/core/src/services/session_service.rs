use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::identity::IdentityProvider;
use crate::models::event::{SessionEvent, User};

const EVENT_CAPACITY: usize = 16;

/// Something that reloads or clears its state when the identity changes.
#[async_trait]
pub trait SessionListener: Send + Sync + 'static {
    fn listener_name(&self) -> &'static str;

    async fn on_session_event(&self, event: &SessionEvent);
}

/// Drive `listener` from a session event stream until the session is dropped.
///
/// Events are handled in order. A handler still running when the next event
/// arrives is dropped at its current await point.
pub fn follow_session<L>(listener: Arc<L>, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()>
where
    L: SessionListener + ?Sized,
{
    tokio::spawn(async move {
        let name = listener.listener_name();
        let mut next = next_event(name, &mut events).await;
        while let Some(event) = next.take() {
            debug!(listener = name, %event, "Handling session event");
            let handled = listener.on_session_event(&event);
            tokio::pin!(handled);

            let step = tokio::select! {
                biased;
                _ = &mut handled => Step::Done,
                newer = next_event(name, &mut events) => match newer {
                    Some(newer) => Step::Superseded(newer),
                    None => Step::Closed,
                },
            };
            next = match step {
                Step::Done => next_event(name, &mut events).await,
                Step::Superseded(newer) => {
                    debug!(listener = name, %event, %newer, "Session event superseded mid-handling");
                    Some(newer)
                }
                Step::Closed => {
                    handled.await;
                    None
                }
            };
        }
    })
}

enum Step {
    Done,
    Superseded(SessionEvent),
    Closed,
}

/// Next event, skipping over lag; `None` once the session is dropped.
async fn next_event(listener: &'static str, events: &mut broadcast::Receiver<SessionEvent>) -> Option<SessionEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(listener, skipped, "Session events dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Current identity plus an "auth is ready" flag, kept in sync with an
/// identity provider.
///
/// Ledgers never read the session directly: they subscribe to the
/// `SessionEvent` stream and react to sign-in / sign-out on their own.
pub struct SessionState {
    identity: Arc<dyn IdentityProvider>,
    user: Mutex<Option<User>>,
    ready: watch::Sender<bool>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        let (ready, _) = watch::channel(false);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            user: Mutex::new(None),
            ready,
            events,
        }
    }

    // ── Delegation ──────────────────────────────────────────────────

    /// Create an account. Failures are propagated unmodified.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User, CoreError> {
        self.identity.sign_up(email, password).await
    }

    pub async fn log_in(&self, email: &str, password: &str) -> Result<User, CoreError> {
        self.identity.sign_in(email, password).await
    }

    pub async fn log_out(&self) -> Result<(), CoreError> {
        self.identity.sign_out().await
    }

    // ── State ───────────────────────────────────────────────────────

    pub fn user(&self) -> Option<User> {
        self.user.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True once the first identity check has completed.
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Resolve once the first identity check has completed.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready.subscribe();
        // the sender lives in `self`, so this only fails if `self` is gone
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Subscribe to identity transitions. Subscribe before calling
    /// `listen_for_auth_state` to observe the initial sign-in.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Register a persistent listener on the identity provider.
    ///
    /// Every notification updates the current user and marks the session
    /// ready; an actual change of identity is published as a `SessionEvent`.
    /// The task runs until the provider drops its change stream.
    pub fn listen_for_auth_state(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.identity.subscribe();
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let initial = changes.borrow_and_update().clone();
            session.apply(initial);
            while changes.changed().await.is_ok() {
                let user = changes.borrow_and_update().clone();
                session.apply(user);
            }
            debug!("Identity provider closed its change stream");
        })
    }

    /// Record the provider's latest answer and publish a transition if the
    /// identity changed.
    pub fn apply(&self, user: Option<User>) {
        let previous = {
            let mut current = self.user.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *current, user.clone())
        };
        self.ready.send_replace(true);

        let event = match (&previous, &user) {
            (Some(old), Some(new)) if old.uid == new.uid => None,
            (_, Some(new)) => Some(SessionEvent::SignedIn(new.clone())),
            (Some(_), None) => Some(SessionEvent::SignedOut),
            (None, None) => None,
        };

        if let Some(event) = event {
            info!(%event, "Session changed");
            // no subscribers is fine
            let _ = self.events.send(event);
        }
    }
}
