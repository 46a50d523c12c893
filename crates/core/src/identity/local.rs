use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info};
use uuid::Uuid;

use super::credentials::{Credential, KdfParams};
use super::IdentityProvider;
use crate::errors::{AuthError, CoreError};
use crate::models::event::User;
use crate::storage::manager::StorageManager;
use crate::storage::{Storage, SYSTEM_SCOPE};

const ACCOUNTS_KEY: &str = "accounts";
const SESSION_KEY: &str = "session";
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    uid: String,
    email: String,
    credential: Credential,
}

impl Account {
    fn user(&self) -> User {
        User {
            uid: self.uid.clone(),
            email: self.email.clone(),
        }
    }
}

/// Self-hosted identity provider backed by `Storage`.
///
/// Accounts live in the system scope; passwords are kept only as Argon2id
/// derivations. The signed-in user is persisted too, so reopening the
/// provider restores the previous session.
pub struct LocalIdentityProvider {
    storage: Arc<dyn Storage>,
    params: KdfParams,
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<Option<User>>,
}

impl LocalIdentityProvider {
    /// Open the provider, restoring accounts and the persisted session.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self, CoreError> {
        let accounts: Vec<Account> =
            StorageManager::load_entries(storage.as_ref(), SYSTEM_SCOPE, ACCOUNTS_KEY)?;
        let session: Option<User> = storage
            .load(SYSTEM_SCOPE, SESSION_KEY)?
            .map(|blob| serde_json::from_str(&blob))
            .transpose()?;

        let accounts: HashMap<String, Account> = accounts
            .into_iter()
            .map(|a| (a.email.clone(), a))
            .collect();
        // a session whose account is gone is not restored
        let session = session.filter(|u| accounts.contains_key(&u.email));
        debug!(accounts = accounts.len(), restored = session.is_some(), "Identity store opened");

        let (state, _) = watch::channel(session);
        Ok(Self {
            storage,
            params: KdfParams::default(),
            accounts: Mutex::new(accounts),
            state,
        })
    }

    /// Override the Argon2 parameters used for new credentials.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    fn normalize_email(email: &str) -> Result<String, AuthError> {
        let email = email.trim().to_lowercase();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
            _ => Err(AuthError::InvalidEmail(email)),
        }
    }

    fn persist_accounts(&self, accounts: &HashMap<String, Account>) -> Result<(), CoreError> {
        let mut list: Vec<&Account> = accounts.values().collect();
        list.sort_by(|a, b| a.email.cmp(&b.email));
        StorageManager::save_entries(self.storage.as_ref(), SYSTEM_SCOPE, ACCOUNTS_KEY, &list)
    }

    fn start_session(&self, user: User) -> Result<User, CoreError> {
        let blob = serde_json::to_string(&user)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize session: {e}")))?;
        self.storage.save(SYSTEM_SCOPE, SESSION_KEY, &blob)?;
        info!(uid = %user.uid, "Signed in");
        self.state.send_replace(Some(user.clone()));
        Ok(user)
    }
}

async fn derive_credential(password: &str, params: KdfParams) -> Result<Credential, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || Credential::create(&password, params))
        .await
        .map_err(|e| AuthError::Credential(e.to_string()))?
}

async fn verify_credential(credential: Credential, password: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || credential.verify(&password))
        .await
        .map_err(|e| AuthError::Credential(e.to_string()))?
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, CoreError> {
        let email = Self::normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN).into());
        }
        if self
            .accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&email)
        {
            return Err(AuthError::EmailInUse(email).into());
        }

        let credential = derive_credential(password, self.params).await?;
        let account = Account {
            uid: Uuid::new_v4().to_string(),
            email: email.clone(),
            credential,
        };
        let user = account.user();

        {
            let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
            // re-checked: another sign-up may have won while deriving
            if accounts.contains_key(&email) {
                return Err(AuthError::EmailInUse(email).into());
            }
            accounts.insert(email.clone(), account);
            if let Err(e) = self.persist_accounts(&accounts) {
                accounts.remove(&email);
                return Err(e);
            }
        }

        info!(uid = %user.uid, "Account created");
        self.start_session(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, CoreError> {
        let email = Self::normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let account = self
            .accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&email)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_credential(account.credential.clone(), password).await? {
            return Err(AuthError::InvalidCredentials.into());
        }
        self.start_session(account.user())
    }

    async fn sign_out(&self) -> Result<(), CoreError> {
        self.storage.remove(SYSTEM_SCOPE, SESSION_KEY)?;
        if let Some(user) = self.state.send_replace(None) {
            info!(uid = %user.uid, "Signed out");
        }
        Ok(())
    }

    fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }
}
