use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

const TOKEN_LEN: usize = 43;

/// Server-side login session, addressed by an opaque token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_uuid: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, user_uuid: Uuid) -> anyhow::Result<Session>;
    /// Live session for `token`; expired ones are dropped and reported as absent.
    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>>;
    /// Returns whether a session was removed.
    async fn destroy(&self, token: &str) -> anyhow::Result<bool>;
    async fn purge_expired(&self) -> anyhow::Result<usize>;
}

fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Process-local sessions. Expired entries are evicted lazily on lookup and
/// swept whenever a new session is created.
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    pub fn with_ttl_minutes(minutes: i64) -> Self {
        Self::new(Duration::minutes(minutes))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    fn sweep(&self, now: OffsetDateTime) -> usize {
        let mut removed = 0;
        self.sessions.retain(|_, s| {
            let keep = !s.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_uuid: Uuid) -> anyhow::Result<Session> {
        let now = OffsetDateTime::now_utc();
        let swept = self.sweep(now);
        if swept > 0 {
            debug!(swept, live = self.len(), "expired sessions removed");
        }
        let expires_at = now
            .checked_add(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("session ttl {} out of range", self.ttl))?;
        let session = Session {
            token: new_token(),
            user_uuid,
            created_at: now,
            expires_at,
        };
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, token: &str) -> anyhow::Result<Option<Session>> {
        let now = OffsetDateTime::now_utc();
        let found = self.sessions.get(token).map(|s| s.value().clone());
        match found {
            Some(s) if s.is_expired(now) => {
                self.sessions.remove(token);
                debug!(user = %s.user_uuid, "session expired");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn destroy(&self, token: &str) -> anyhow::Result<bool> {
        Ok(self.sessions.remove(token).is_some())
    }

    async fn purge_expired(&self) -> anyhow::Result<usize> {
        Ok(self.sweep(OffsetDateTime::now_utc()))
    }
}

/// Purges expired sessions every `every` until the runtime shuts down.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "session sweep"),
                Err(e) => warn!(error = %e, "session sweep failed"),
            }
        }
    })
}

/// Value of cookie `name` in a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

pub fn session_cookie(name: &str, token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", 0, secure)
}
