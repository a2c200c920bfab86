use std::sync::Arc;

use shared::domain::Identity;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::auth::AuthProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// Process-wide view of who is signed in. `init` starts following the auth
/// provider; `teardown` stops it.
pub struct SessionStore {
    state: Arc<watch::Sender<SessionSnapshot>>,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            state: Arc::new(state),
            follower: Mutex::new(None),
        }
    }

    pub async fn init(&self, auth: Arc<dyn AuthProvider>) {
        let mut changes = auth.subscribe_identity();
        let identity = match auth.get_user().await {
            Ok(identity) => identity,
            Err(err) => {
                warn!("session: initial identity lookup failed: {err:#}");
                None
            }
        };
        self.state.send_replace(SessionSnapshot {
            identity,
            loading: false,
        });

        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let identity = changes.borrow_and_update().clone();
                info!(
                    "session: identity changed user_id={:?}",
                    identity.as_ref().map(|identity| identity.user_id.0)
                );
                state.send_replace(SessionSnapshot {
                    identity,
                    loading: false,
                });
            }
        });
        if let Some(previous) = self.follower.lock().await.replace(handle) {
            previous.abort();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub async fn teardown(&self) {
        if let Some(handle) = self.follower.lock().await.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(handle) = self.follower.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
