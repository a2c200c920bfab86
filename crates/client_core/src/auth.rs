use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use shared::{domain::Identity, protocol::AuthSession};
use storage::Storage;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{EditorError, EditorResult},
    validate,
};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<AuthSession>>;
    async fn get_user(&self) -> Result<Option<Identity>>;
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_out(&self) -> Result<()>;
    /// Fires on every sign-in and sign-out.
    fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>>;
}

/// Resolves the signed-in user, or fails with `AuthRequired` naming `action`.
pub async fn require_identity(auth: &dyn AuthProvider, action: &str) -> EditorResult<Identity> {
    match auth.get_user().await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => Err(EditorError::AuthRequired(action.to_string())),
        Err(err) => {
            warn!("auth: identity lookup failed action={action}: {err:#}");
            Err(EditorError::AuthRequired(action.to_string()))
        }
    }
}

pub struct MissingAuthProvider {
    identity: watch::Sender<Option<Identity>>,
}

impl Default for MissingAuthProvider {
    fn default() -> Self {
        let (identity, _) = watch::channel(None);
        Self { identity }
    }
}

#[async_trait]
impl AuthProvider for MissingAuthProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(None)
    }

    async fn get_user(&self) -> Result<Option<Identity>> {
        Ok(None)
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        Err(anyhow!("auth provider is unavailable"))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<AuthSession> {
        Err(anyhow!("auth provider is unavailable"))
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

/// Password auth backed by the `users` table. The session lives in memory for
/// the lifetime of the provider.
pub struct StorageAuthProvider {
    storage: Storage,
    session: Mutex<Option<AuthSession>>,
    identity: watch::Sender<Option<Identity>>,
}

impl StorageAuthProvider {
    pub fn new(storage: Storage) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            storage,
            session: Mutex::new(None),
            identity,
        }
    }

    async fn establish(&self, identity: Identity) -> AuthSession {
        let session = AuthSession {
            identity: identity.clone(),
            token: Uuid::new_v4(),
            issued_at: Utc::now(),
        };
        *self.session.lock().await = Some(session.clone());
        self.identity.send_replace(Some(identity));
        session
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl AuthProvider for StorageAuthProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>> {
        Ok(self.session.lock().await.clone())
    }

    async fn get_user(&self) -> Result<Option<Identity>> {
        let Some(session) = self.session.lock().await.clone() else {
            return Ok(None);
        };
        let user_id = session.identity.user_id;
        match self.storage.email_for_user(user_id).await? {
            Some(email) => Ok(Some(Identity { user_id, email })),
            None => {
                warn!("auth: session user no longer exists user_id={user_id}");
                *self.session.lock().await = None;
                self.identity.send_replace(None);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim();
        let credentials = self
            .storage
            .user_credentials(email)
            .await
            .context("failed to look up credentials")?;
        let Some(credentials) = credentials else {
            bail!("invalid login credentials");
        };
        if hash_password(&credentials.password_salt, password) != credentials.password_hash {
            bail!("invalid login credentials");
        }
        info!(
            "auth: signed in user_id={} email={}",
            credentials.user_id, credentials.email
        );
        Ok(self
            .establish(Identity {
                user_id: credentials.user_id,
                email: credentials.email,
            })
            .await)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = validate::email(email)?;
        validate::password(password)?;
        let salt = Uuid::new_v4().simple().to_string();
        let user_id = self
            .storage
            .create_user(&email, &hash_password(&salt, password), &salt)
            .await?;
        info!("auth: registered user_id={user_id} email={email}");
        Ok(self.establish(Identity { user_id, email }).await)
    }

    async fn sign_out(&self) -> Result<()> {
        if let Some(session) = self.session.lock().await.take() {
            info!("auth: signed out user_id={}", session.identity.user_id);
        }
        self.identity.send_replace(None);
        Ok(())
    }

    fn subscribe_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
