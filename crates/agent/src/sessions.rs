//! TTL-bounded in-memory session store.
//!
//! Each session is wrapped in its own `Mutex`, so concurrent requests for
//! the same session id serialize while different sessions proceed in
//! parallel. The outer map lock is held only long enough to clone the
//! per-session handle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use selly_core::domain::session::{Session, SessionId};

pub type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Creates a fresh session and returns its id.
    pub async fn create(&self) -> SessionId {
        let id = SessionId::random();
        let session = Session::new(id.clone(), self.ttl);
        self.sessions.write().await.insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    /// Looks up a live session. Expired sessions are evicted on contact and
    /// reported as absent, so a dead id behaves exactly like an unknown one.
    pub async fn checkout(&self, id: &SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.read().await.get(id).cloned()?;

        let expired = handle.lock().await.is_expired(Utc::now());
        if expired {
            self.remove(id).await;
            debug!(session_id = %id, "evicted expired session on access");
            return None;
        }

        Some(handle)
    }

    pub async fn remove(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
    }

    /// Background sweep: drops every expired session. Sessions whose lock is
    /// currently held are skipped; an in-flight turn will renew or the next
    /// sweep will catch them.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => !session.is_expired(now),
            Err(_) => true,
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "session sweep");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
