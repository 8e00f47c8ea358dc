//! Connection registry
//!
//! The one structure mutated by unrelated connections: a map from
//! nickname to live session. Nickname resolution and insertion happen
//! under a single lock so two simultaneous handshakes can never claim
//! the same resolved name. Join/leave notifications fire while the
//! lock is held, which keeps them ordered with the mutations that
//! caused them; observers must not call back into the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::RelayError;
use crate::observer::RelayObserver;
use crate::protocol::Frame;
use crate::session::Session;

/// Nickname -> session map for one server instance
pub struct Registry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    observer: Arc<dyn RelayObserver>,
}

impl Registry {
    pub fn new(observer: Arc<dyn RelayObserver>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            observer,
        }
    }

    /// The injected operator-notification interface
    pub fn observer(&self) -> &dyn RelayObserver {
        self.observer.as_ref()
    }

    /// Register a session under its exact nickname.
    ///
    /// Fails if the nickname is taken; use [`register_unique`] when the
    /// caller wants collisions resolved instead.
    ///
    /// [`register_unique`]: Registry::register_unique
    pub fn register(&self, session: Arc<Session>) -> Result<(), RelayError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(session.nickname()) {
            return Err(RelayError::NicknameTaken(session.nickname().to_string()));
        }
        let nickname = session.nickname().to_string();
        sessions.insert(nickname.clone(), session);
        self.observer.on_join(&nickname);
        Ok(())
    }

    /// Resolve a free nickname from `proposed` and register a new
    /// session under it, as one critical section.
    ///
    /// A taken name gets `_1`, `_2`, ... appended until free.
    pub fn register_unique(&self, proposed: &str, outbound: mpsc::Sender<Frame>) -> Arc<Session> {
        let mut sessions = self.sessions.lock().unwrap();

        let mut nickname = proposed.to_string();
        let mut suffix = 0u32;
        while sessions.contains_key(&nickname) {
            suffix += 1;
            nickname = format!("{}_{}", proposed, suffix);
        }

        let session = Arc::new(Session::new(nickname.clone(), outbound));
        sessions.insert(nickname.clone(), session.clone());
        debug!("registered '{}' ({} online)", nickname, sessions.len());
        self.observer.on_join(&nickname);
        session
    }

    /// Remove a session. No-op if absent; returns whether anything was
    /// removed. `on_leave` fires only for the call that removed it, so
    /// racing teardown paths notify exactly once.
    pub fn unregister(&self, nickname: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap();
        let removed = sessions.remove(nickname).is_some();
        if removed {
            debug!("unregistered '{}' ({} online)", nickname, sessions.len());
            self.observer.on_leave(nickname);
        }
        removed
    }

    pub fn lookup(&self, nickname: &str) -> Option<Arc<Session>> {
        self.sessions.lock().unwrap().get(nickname).cloned()
    }

    /// Point-in-time snapshot of registered nicknames
    pub fn all_nicknames(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }

    /// Point-in-time snapshot of registered sessions (broadcast, reaper)
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
