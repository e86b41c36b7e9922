use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::pipeline::runner::Session;

pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 60 * 60;

/// In-memory registry of live sessions.
///
/// Each session sits behind its own mutex: turns within a session run one at
/// a time, while different sessions never share state or block each other.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session and returns a handle to it.
    pub async fn create(&self, user_id: &str) -> Arc<Mutex<Session>> {
        let session = Session::new(user_id);
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, handle.clone());
        info!(
            "Session {id} created for user {user_id} ({} active)",
            sessions.len()
        );
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Ends a session and drops its state. Returns `false` if it did not exist.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!("Session {id} ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops every session whose last turn is older than `max_idle`.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        match chrono::Duration::from_std(max_idle) {
            Ok(max_idle) => self.evict_idle_before(Utc::now() - max_idle).await,
            Err(_) => 0,
        }
    }

    /// Drops sessions last touched before `cutoff`. Sessions with a turn in
    /// flight are locked and always kept.
    pub async fn evict_idle_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(session) => {
                let keep = session.updated_at() >= cutoff;
                if !keep {
                    debug!("Session {id} evicted after inactivity");
                }
                keep
            }
            Err(_) => true,
        });
        before - sessions.len()
    }

    /// Periodically evicts idle sessions. Runs until the process exits.
    pub async fn sweep(self, max_idle: Duration, every: Duration) {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let evicted = self.evict_idle(max_idle).await;
            if evicted > 0 {
                info!("Evicted {evicted} idle sessions, {} active", self.len().await);
            }
        }
    }
}
