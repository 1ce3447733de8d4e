// src/session/mod.rs
// Holds the authenticated user and bearer token, persisted to a durable
// session file so it survives a restart. All mutations are synchronously
// visible in-process and published to watchers.

use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::User;

/// The current session. Invariant: `token` is non-null iff `user` is
/// non-null; the two constructors are the only way to build one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User, token: String) -> Self {
        Session {
            user: Some(user),
            token: Some(token),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn is_consistent(&self) -> bool {
        self.token.is_some() == self.user.is_some()
    }
}

pub struct SessionStore {
    path: Option<PathBuf>,
    current: RwLock<Session>,
    publisher: watch::Sender<Session>,
}

impl SessionStore {
    /// Store with no durable copy. Used by tests and one-shot tooling.
    pub fn in_memory() -> Self {
        Self::with_initial(None, Session::anonymous())
    }

    /// Initialize from any previously persisted session. A missing,
    /// unparseable or inconsistent file degrades to an anonymous session
    /// rather than an error.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let session = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) if session.is_consistent() => {
                    debug!(path = %path.display(), "restored persisted session");
                    session
                }
                Ok(_) => {
                    warn!(path = %path.display(), "persisted session is inconsistent, starting unauthenticated");
                    Session::anonymous()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to parse persisted session, starting unauthenticated");
                    Session::anonymous()
                }
            },
            Err(_) => Session::anonymous(),
        };
        Self::with_initial(Some(path), session)
    }

    fn with_initial(path: Option<PathBuf>, session: Session) -> Self {
        let (publisher, _) = watch::channel(session.clone());
        SessionStore {
            path,
            current: RwLock::new(session),
            publisher,
        }
    }

    /// Replace the session atomically and persist it.
    pub fn set_session(&self, user: User, token: String) {
        let session = Session::authenticated(user, token);
        self.replace(session.clone());
        self.persist(&session);
    }

    /// Reset to the anonymous session and remove the durable copy.
    pub fn clear_session(&self) {
        self.replace(Session::anonymous());
        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove persisted session"),
            }
        }
    }

    pub fn session(&self) -> Session {
        self.read().clone()
    }

    /// Current bearer token, if any. Never fails.
    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Watch for session changes. The receiver sees every `set_session` /
    /// `clear_session` in order.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.publisher.subscribe()
    }

    fn replace(&self, session: Session) {
        {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            *guard = session.clone();
        }
        // send_replace stores the value even while no watcher is subscribed
        let _ = self.publisher.send_replace(session);
    }

    fn read(&self) -> Session {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn persist(&self, session: &Session) {
        let Some(path) = &self.path else { return };
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "failed to create session directory");
                return;
            }
        }
        match serde_json::to_string_pretty(session) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!(path = %path.display(), error = %e, "failed to persist session");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize session"),
        }
    }
}
