// Session Registry
//
// Owns the live chat sessions of a hosting process, keyed by an opaque
// client key (a browser session hash, a console user, a test name).
// Each session sits behind its own mutex: turns on one session serialize,
// while different sessions never share state.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::error::{ChatError, Result};
use crate::session::ChatSession;

/// Shared handle to a registered session
pub type SessionHandle = Arc<Mutex<ChatSession>>;

/// A key's slot; empty while its session is still being created
type Slot = Arc<OnceCell<SessionHandle>>;

struct Entry {
    slot: Slot,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl Entry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            slot: Arc::new(OnceCell::new()),
            created_at: now,
            last_active: now,
        }
    }

    fn session(&self) -> Option<SessionHandle> {
        self.slot.get().cloned()
    }

    fn is_ready(&self) -> bool {
        self.slot.initialized()
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_active).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `key`, creating it with `factory` on first use.
    ///
    /// The registry lock only covers claiming the key's slot. The factory runs
    /// outside it, so a slow thread creation never stalls other keys, while
    /// concurrent first requests for the same key still share one session.
    /// A failed factory leaves the key unregistered.
    pub async fn get_or_create<F, Fut>(&self, key: &str, factory: F) -> Result<SessionHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChatSession>>,
    {
        let slot = {
            let mut sessions = self.sessions.write().await;
            let now = Utc::now();
            let entry = sessions
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(now));
            entry.last_active = now;
            entry.slot.clone()
        };

        let created = slot
            .get_or_try_init(|| async move {
                let session = factory().await?;
                tracing::info!(
                    key = %key,
                    session_id = %session.id(),
                    thread_id = %session.thread_id(),
                    "Registered chat session"
                );
                Ok::<_, ChatError>(Arc::new(Mutex::new(session)))
            })
            .await
            .cloned();

        let mut sessions = self.sessions.write().await;
        let claimed = sessions
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.slot, &slot));

        match created {
            Ok(handle) => {
                if !sessions.contains_key(key) {
                    // Evicted or dropped by a failed attempt while the factory ran
                    let mut entry = Entry::new(Utc::now());
                    entry.slot = slot;
                    sessions.insert(key.to_string(), entry);
                }
                Ok(handle)
            }
            Err(e) => {
                if claimed && !slot.initialized() {
                    sessions.remove(key);
                }
                tracing::warn!(key = %key, error = %e, "Failed to create chat session");
                Err(e)
            }
        }
    }

    /// Look up a session and mark it active. A session still being created
    /// is not returned.
    pub async fn get(&self, key: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(key)?;
        let session = entry.session()?;
        entry.last_active = Utc::now();
        Some(session)
    }

    /// Start a new conversation for `key`
    pub async fn reset(&self, key: &str) -> Result<()> {
        let handle = self
            .get(key)
            .await
            .ok_or_else(|| ChatError::session_not_found(key))?;
        let mut session = handle.lock().await;
        session.reset().await
    }

    /// Remove a session. Returns false when the key was unknown.
    pub async fn evict(&self, key: &str) -> bool {
        let removed = self.sessions.write().await.remove(key);
        if let Some(entry) = &removed {
            tracing::info!(
                key = %key,
                age_secs = (Utc::now() - entry.created_at).num_seconds(),
                "Evicted chat session"
            );
        }
        removed.is_some_and(|entry| entry.is_ready())
    }

    /// Remove every session idle for at least `max_idle`; returns their keys.
    /// Sessions still being created are kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.is_ready() && entry.idle_for(now) >= max_idle)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            sessions.remove(key);
        }

        if !expired.is_empty() {
            tracing::info!(
                evicted = expired.len(),
                remaining = sessions.len(),
                max_idle_secs = max_idle.as_secs(),
                "Evicted idle chat sessions"
            );
        }
        expired
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(key)
            .is_some_and(Entry::is_ready)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.is_ready())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.is_ready())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
