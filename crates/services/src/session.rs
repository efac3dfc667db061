//! # Session
//!
//! The app shell's view of who is signed in. A background task follows the
//! provider's session feed for as long as the watcher lives and republishes
//! each change as an [`AppSession`].

use std::sync::Arc;

use domains::{is_admin, Allowlist, AuthProvider, Language, RawSession, SessionUser};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Read-only ambient context handed to pages and the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppSession {
    pub user: Option<SessionUser>,
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

fn metadata_str<'a>(meta: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| meta.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Reduces a provider session to the identity the site uses.
pub fn project_session(raw: &RawSession) -> SessionUser {
    let meta = &raw.user_metadata;
    let display_name = metadata_str(meta, &["full_name", "name", "user_name"])
        .or(raw.email.as_deref())
        .unwrap_or_default()
        .to_string();
    let photo_url = metadata_str(meta, &["avatar_url", "picture"]).map(str::to_string);
    SessionUser {
        id: raw.user_id.clone(),
        display_name,
        photo_url,
    }
}

pub fn derive_session(raw: Option<&RawSession>, allowlist: &Allowlist) -> AppSession {
    let user = raw.map(project_session);
    let is_admin = is_admin(allowlist, user.as_ref().map(|u| u.id.as_str()));
    AppSession { user, is_admin }
}

pub struct SessionWatcher {
    current: watch::Receiver<AppSession>,
    task: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    /// Subscribes to `provider`. The initial session is available from
    /// [`Self::current`] immediately; later changes follow.
    pub fn spawn(provider: &dyn AuthProvider, allowlist: Allowlist) -> Self {
        let mut feed = provider.subscribe();
        let initial = derive_session(feed.borrow_and_update().as_ref(), &allowlist);
        let (tx, current) = watch::channel(initial);

        let task = tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let next = derive_session(feed.borrow_and_update().as_ref(), &allowlist);
                info!(
                    user = next.user.as_ref().map(|u| u.id.as_str()).unwrap_or("-"),
                    is_admin = next.is_admin,
                    "session changed"
                );
                if tx.send(next).is_err() {
                    break;
                }
            }
            debug!("session feed closed");
        });

        Self {
            current,
            task: Some(task),
        }
    }

    pub fn current(&self) -> AppSession {
        self.current.borrow().clone()
    }

    /// A receiver that observes every later change.
    pub fn changes(&self) -> watch::Receiver<AppSession> {
        self.current.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops following the provider. The last known session stays readable.
    pub fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("session subscription dropped");
        }
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Top-level state: language toggle plus the session subscription.
pub struct AppShell {
    language: Language,
    auth: Arc<dyn AuthProvider>,
    session: SessionWatcher,
}

impl AppShell {
    pub fn start(auth: Arc<dyn AuthProvider>, allowlist: Allowlist) -> Self {
        let session = SessionWatcher::spawn(auth.as_ref(), allowlist);
        Self {
            language: Language::default(),
            auth,
            session,
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, lang: Language) {
        self.language = lang;
    }

    pub fn toggle_language(&mut self) -> Language {
        self.language = self.language.toggle();
        self.language
    }

    pub fn session(&self) -> AppSession {
        self.session.current()
    }

    pub fn session_changes(&self) -> watch::Receiver<AppSession> {
        self.session.changes()
    }

    /// Fire-and-forget: a failure is logged, never returned.
    pub async fn sign_in(&self, provider: &str) {
        if let Err(e) = self.auth.sign_in(provider).await {
            error!(provider, error = %e, "sign-in failed");
        }
    }

    pub async fn sign_out(&self) {
        if let Err(e) = self.auth.sign_out().await {
            error!(error = %e, "sign-out failed");
        }
    }

    pub fn shutdown(mut self) {
        self.session.unsubscribe();
    }
}
