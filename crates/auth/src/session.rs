//! Shared in-memory session store.
//!
//! Mutated by both the gate and the identity provider's logout callback; the
//! cooperative single-process execution model is the only synchronization
//! beyond the lock itself. Sessions do not survive a restart.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Session {
    subject: String,
    expires_at: Instant,
}

/// In-memory map from session identifier to authenticated subject.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Create a store whose sessions expire `ttl` after their last use.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a live session, refreshing its expiry on use.
    ///
    /// Expired sessions are dropped on sight and read as absent.
    pub async fn resolve(&self, session_id: &str) -> Option<String> {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(session_id) {
            Some(session) if session.expires_at > Instant::now() => {
                session.expires_at = Instant::now() + self.ttl;
                Some(session.subject.clone())
            }
            Some(_) => {
                sessions.remove(session_id);
                None
            }
            None => None,
        }
    }

    /// Create or refresh a session for the given subject.
    pub async fn upsert(&self, session_id: &str, subject: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.to_string(),
            Session {
                subject: subject.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove a session, e.g. from the logout callback.
    ///
    /// Returns whether a session existed under that identifier.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_resolve() {
        let store = SessionStore::new(Duration::from_secs(3600));

        store.upsert("sid-1", "u1").await;
        assert_eq!(store.resolve("sid-1").await, Some("u1".to_string()));
        assert_eq!(store.resolve("sid-2").await, None);
    }

    #[tokio::test]
    async fn test_upsert_refreshes_subject() {
        let store = SessionStore::new(Duration::from_secs(3600));

        store.upsert("sid-1", "u1").await;
        store.upsert("sid-1", "u2").await;
        assert_eq!(store.resolve("sid-1").await, Some("u2".to_string()));
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let store = SessionStore::new(Duration::ZERO);

        store.upsert("sid-1", "u1").await;
        assert_eq!(store.resolve("sid-1").await, None);
        // The expired entry is gone, not just hidden.
        assert!(!store.remove("sid-1").await);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SessionStore::new(Duration::from_secs(3600));

        store.upsert("sid-1", "u1").await;
        assert!(store.remove("sid-1").await);
        assert!(!store.remove("sid-1").await);
        assert_eq!(store.resolve("sid-1").await, None);
    }
}
