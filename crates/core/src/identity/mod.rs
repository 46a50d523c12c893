pub mod credentials;
pub mod local;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::errors::CoreError;
use crate::models::event::User;

/// The identity service the session delegates to.
///
/// Failures are returned unmodified; callers decide how to display them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, CoreError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, CoreError>;

    async fn sign_out(&self) -> Result<(), CoreError>;

    fn current_user(&self) -> Option<User>;

    /// Change stream of the signed-in user. The initial value is the
    /// provider's answer to "who is signed in right now".
    fn subscribe(&self) -> watch::Receiver<Option<User>>;
}
