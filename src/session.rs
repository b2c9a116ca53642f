use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::history::SessionHistory;

/// One user's session. The async mutex serialises requests for the same
/// session across the whole orchestrated call.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    history: tokio::sync::Mutex<SessionHistory>,
    last_seen: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            history: tokio::sync::Mutex::new(SessionHistory::new()),
            last_seen: Mutex::new(now),
        }
    }

    pub fn history(&self) -> &tokio::sync::Mutex<SessionHistory> { &self.history }

    pub fn touch(&self) { *self.last_seen.lock() = Utc::now(); }

    pub fn last_seen(&self) -> DateTime<Utc> { *self.last_seen.lock() }
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub selected_moods: Vec<String>,
    pub generated_texts: Vec<String>,
    pub key_phrases: Vec<String>,
}

impl SessionSnapshot {
    pub fn capture(session: &Session, history: &SessionHistory) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            last_seen: session.last_seen(),
            selected_moods: history.selected_tags(),
            generated_texts: history.generated_texts().map(str::to_string).collect(),
            key_phrases: history.key_phrases().map(str::to_string).collect(),
        }
    }
}

/// Isolated per-session state. The map lock is never held across an await.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self { Self::default() }

    pub fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        self.sessions.lock().insert(session.id, session.clone());
        tracing::debug!(session_id = %session.id, "session created");
        session
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.lock().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize { self.sessions.lock().len() }

    /// Drops sessions idle for longer than `ttl`. Returns how many went.
    pub fn prune_idle(&self, ttl: Duration) -> usize {
        self.prune_idle_at(Utc::now(), ttl)
    }

    fn prune_idle_at(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut map = self.sessions.lock();
        let before = map.len();
        map.retain(|_, s| now - s.last_seen() <= ttl);
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new();
        let a = store.create();
        let b = store.create();
        a.history().lock().await.record_accepted("only in a");
        assert_eq!(b.history().lock().await.generated_texts().count(), 0);
        assert_eq!(store.get(&a.id).unwrap().history().lock().await.generated_texts().count(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_and_removed_sessions() {
        let store = SessionStore::new();
        assert!(store.get(&Uuid::new_v4()).is_none());
        let s = store.create();
        assert!(store.remove(&s.id));
        assert!(!store.remove(&s.id));
        assert!(store.get(&s.id).is_none());
    }

    #[test]
    fn prune_drops_only_idle_sessions() {
        let store = SessionStore::new();
        let s = store.create();
        assert_eq!(store.prune_idle_at(Utc::now(), Duration::minutes(5)), 0);
        let later = Utc::now() + Duration::minutes(10);
        assert_eq!(store.prune_idle_at(later, Duration::minutes(5)), 1);
        assert!(store.get(&s.id).is_none());
    }
}
