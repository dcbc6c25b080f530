//! In-memory session registry.
//!
//! Each session sits behind its own mutex so turns on one session are
//! serialized while independent sessions proceed in parallel. The outer map
//! lock is held only long enough to look up, insert, or remove an entry.
//! Sessions idle for longer than the store's TTL are evicted by a background
//! sweep; a session whose lock is held is never considered idle.

use chrono::{DateTime, Utc};
use pitchperfect_core::session::Session;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tracing::info;
use uuid::Uuid;

const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

pub struct SessionEntry {
    pub session: Session,
    pub created_at: DateTime<Utc>,
    last_active: Instant,
}

impl SessionEntry {
    pub fn last_active(&self) -> Instant {
        self.last_active
    }
}

pub type SharedEntry = Arc<Mutex<SessionEntry>>;

#[derive(Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<Uuid, SharedEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    /// Creates an empty store whose sessions expire after `ttl` without use.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            ttl,
        }
    }

    /// Registers a session under a fresh id.
    pub async fn insert(&self, session: Session) -> (Uuid, DateTime<Utc>) {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        let entry = SessionEntry {
            session,
            created_at,
            last_active: Instant::now(),
        };
        self.entries
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));
        (id, created_at)
    }

    /// Looks up a session and marks it as active.
    pub async fn get(&self, id: Uuid) -> Option<SharedEntry> {
        let entry = self.entries.read().await.get(&id).cloned()?;
        entry.lock().await.last_active = Instant::now();
        Some(entry)
    }

    /// Returns `false` when no session had that id.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.entries.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every session idle for at least the TTL. Returns how many were dropped.
    pub async fn evict_idle(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| match entry.try_lock() {
            Ok(entry) => entry.last_active.elapsed() < self.ttl,
            // Busy with a turn.
            Err(_) => true,
        });
        before - entries.len()
    }

    /// Starts the background task that periodically calls [`Self::evict_idle`].
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let store = self.clone();
        let period = self.ttl.clamp(Duration::from_millis(1), MAX_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = store.evict_idle().await;
                if evicted > 0 {
                    info!(evicted, "Evicted idle sessions");
                }
            }
        })
    }
}
