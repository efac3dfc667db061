//! In-process `AuthProvider` backed by a watch channel. Used by the dev
//! server and by tests; a hosted provider pushes its sessions into the same
//! channel through [`ChannelAuthProvider::publish`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use domains::{AuthError, AuthProvider, RawSession};
use tokio::sync::watch;
use tracing::{info, warn};

pub struct ChannelAuthProvider {
    sessions: watch::Sender<Option<RawSession>>,
    /// Session each sign-in provider yields.
    identities: Mutex<HashMap<String, RawSession>>,
}

impl Default for ChannelAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelAuthProvider {
    pub fn new() -> Self {
        let (sessions, _) = watch::channel(None);
        Self {
            sessions,
            identities: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the identity returned by signing in through `provider`.
    pub fn with_identity(self, provider: &str, session: RawSession) -> Self {
        self.identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider.to_string(), session);
        self
    }

    /// Replaces the current session and notifies every subscriber.
    pub fn publish(&self, session: Option<RawSession>) {
        self.sessions.send_replace(session);
    }

    pub fn current(&self) -> Option<RawSession> {
        self.sessions.borrow().clone()
    }
}

#[async_trait]
impl AuthProvider for ChannelAuthProvider {
    fn subscribe(&self) -> watch::Receiver<Option<RawSession>> {
        self.sessions.subscribe()
    }

    async fn sign_in(&self, provider: &str) -> Result<(), AuthError> {
        let session = self
            .identities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned();
        match session {
            Some(session) => {
                info!(provider, user = %session.user_id, "signed in");
                self.publish(Some(session));
                Ok(())
            }
            None => {
                warn!(provider, "sign-in with unconfigured provider");
                Err(AuthError::SignIn(format!("provider '{provider}' is not configured")))
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.publish(None);
        info!("signed out");
        Ok(())
    }
}
