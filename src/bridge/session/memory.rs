use super::{Principal, SessionBinder, SessionId};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::RwLock, task::JoinHandle};
use tracing::debug;

/// Longest session lifetime the store honours; longer TTLs are clamped.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

struct Entry {
    principal: Principal,
    expires_at: Instant,
}

/// Sessions held in process memory; lost on restart.
#[derive(Clone)]
pub struct MemorySessions {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Duration,
}

impl std::fmt::Debug for MemorySessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessions")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl MemorySessions {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: ttl.min(MAX_SESSION_TTL),
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop expired sessions, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now < entry.expires_at);
        before - sessions.len()
    }

    /// Purge expired sessions every `every` until the handle is aborted.
    #[must_use]
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let sessions = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = sessions.purge_expired().await;
                if removed > 0 {
                    debug!("Purged {removed} expired sessions");
                }
            }
        })
    }
}

#[async_trait]
impl SessionBinder for MemorySessions {
    async fn current(&self, id: &SessionId) -> Option<Principal> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.principal.clone())
    }

    async fn bind(&self, id: &SessionId, principal: Principal) {
        let now = Instant::now();
        let entry = Entry {
            principal,
            expires_at: now.checked_add(self.ttl).unwrap_or(now),
        };
        self.sessions.write().await.insert(id.clone(), entry);
    }

    async fn unbind(&self, id: &SessionId) {
        self.sessions.write().await.remove(id);
    }
}
