//! Registry: the broker's shared table of online sessions.
//!
//! Every connection handler, the router, and the heartbeat monitor share one
//! `Arc<Registry>`.  The table maps [`SessionId`] to [`Session`] and is
//! guarded by a `tokio::sync::RwLock`; no lock is ever held across a network
//! write.  Callers take a cheap `Arc<Session>` out of the table and write to
//! it after the lock is released.
//!
//! # Id assignment
//!
//! Ids come from a monotonically increasing counter that starts at 1 (0 is
//! reserved for system frames).  Ids are never reused while the broker runs.
//!
//! # Removal is idempotent
//!
//! A session can be removed by its own handler (logout or disconnect), by the
//! router (failed relay), or by the heartbeat (failed probe), possibly at the
//! same time.  [`Registry::unregister`] returns the removed session to exactly
//! one caller and `None` to everyone else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chat_core::{OnlineUsers, SessionId};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::session::{FrameSink, Session};

/// Errors returned by [`Registry`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The connection closed before the session could be registered.
    #[error("connection closed before registration")]
    ConnectionClosed,
}

/// Concurrent table of online sessions.
pub struct Registry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adds a new session and returns its freshly assigned id.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ConnectionClosed`] if `sink` is already closed.
    pub async fn register(
        &self,
        nickname: impl Into<String>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<SessionId, RegistryError> {
        if sink.is_closed() {
            return Err(RegistryError::ConnectionClosed);
        }
        let nickname = nickname.into();
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id, nickname.clone(), sink));

        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session);
        info!(session = %id, %nickname, online = sessions.len(), "session registered");
        Ok(id)
    }

    /// Removes a session.  Returns it if it was present; `None` otherwise.
    pub async fn unregister(&self, id: SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id);
        if let Some(session) = &removed {
            info!(
                session = %id,
                nickname = %session.nickname(),
                online = sessions.len(),
                "session unregistered"
            );
        }
        removed
    }

    /// Removes a session and closes its connection.
    ///
    /// Closing wakes the session's own handler, which then stops reading.
    /// Returns `true` if this call was the one that removed the session.
    pub async fn evict(&self, id: SessionId) -> bool {
        match self.unregister(id).await {
            Some(session) => {
                session.close().await;
                debug!(session = %id, "session evicted");
                true
            }
            None => false,
        }
    }

    /// Returns the session with this id, if it is online.
    pub async fn lookup(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Id → nickname for every online session, ordered by id.
    pub async fn snapshot(&self) -> OnlineUsers {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| (s.id(), s.nickname().to_string()))
            .collect()
    }

    /// Every online session, ordered by id.
    pub async fn sessions(&self) -> Vec<Arc<Session>> {
        let mut all: Vec<_> = self.sessions.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.id());
        all
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::session::testing::RecordingSink;
    use super::*;

    #[tokio::test]
    async fn test_register_assigns_increasing_ids_from_one() {
        // Arrange
        let registry = Registry::new();

        // Act
        let a = registry.register("alice", RecordingSink::new()).await.unwrap();
        let b = registry.register("bob", RecordingSink::new()).await.unwrap();

        // Assert
        assert_eq!(a, SessionId::new(1));
        assert_eq!(b, SessionId::new(2));
        assert!(!a.is_system());
    }

    #[tokio::test]
    async fn test_duplicate_nicknames_get_distinct_ids() {
        let registry = Registry::new();

        let first = registry.register("sam", RecordingSink::new()).await.unwrap();
        let second = registry.register("sam", RecordingSink::new()).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_register_rejects_closed_sink() {
        // Arrange
        let registry = Registry::new();
        let sink = RecordingSink::new();
        sink.close().await;

        // Act
        let result = registry.register("ghost", sink).await;

        // Assert
        assert_eq!(result, Err(RegistryError::ConnectionClosed));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        let id = registry.register("alice", RecordingSink::new()).await.unwrap();

        assert!(registry.unregister(id).await.is_some());
        assert!(registry.unregister(id).await.is_none());
        assert!(registry.unregister(SessionId::new(999)).await.is_none());
        assert!(registry.lookup(id).await.is_none());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_unregister() {
        let registry = Registry::new();
        let first = registry.register("alice", RecordingSink::new()).await.unwrap();
        registry.unregister(first).await;

        let second = registry.register("bob", RecordingSink::new()).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_evict_closes_sink_and_reports_only_once() {
        // Arrange
        let registry = Registry::new();
        let sink = RecordingSink::new();
        let id = registry.register("carol", sink.clone()).await.unwrap();

        // Act
        let first = registry.evict(id).await;
        let second = registry.evict(id).await;

        // Assert
        assert!(first);
        assert!(!second);
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_snapshot_lists_every_session_in_id_order() {
        // Arrange
        let registry = Registry::new();
        for nick in ["alice", "bob", "carol"] {
            registry.register(nick, RecordingSink::new()).await.unwrap();
        }
        registry.unregister(SessionId::new(2)).await;

        // Act
        let snapshot = registry.snapshot().await;

        // Assert
        let entries: Vec<_> = snapshot.into_iter().collect();
        assert_eq!(
            entries,
            vec![
                (SessionId::new(1), "alice".to_string()),
                (SessionId::new(3), "carol".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_registrations_never_share_an_id() {
        // Arrange
        let registry = Arc::new(Registry::new());

        // Act
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry.register(format!("user{i}"), RecordingSink::new()).await.unwrap()
                })
            })
            .collect();
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }

        // Assert
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert_eq!(registry.len().await, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_churn_never_loses_or_resurrects_sessions() {
        use std::collections::HashSet;
        use std::sync::Mutex;

        // Arrange
        let registry = Arc::new(Registry::new());
        let removed = Arc::new(Mutex::new(HashSet::new()));
        let churning = Arc::new(std::sync::atomic::AtomicBool::new(true));

        // Act: workers log in and out while readers take snapshots
        let workers: Vec<_> = (0..8)
            .map(|w| {
                let registry = Arc::clone(&registry);
                let removed = Arc::clone(&removed);
                tokio::spawn(async move {
                    let mut kept = Vec::new();
                    for i in 0..25 {
                        let id = registry
                            .register(format!("user{w}-{i}"), RecordingSink::new())
                            .await
                            .unwrap();
                        assert!(registry.snapshot().await.contains_key(&id));
                        if i % 2 == 0 {
                            assert!(registry.unregister(id).await.is_some());
                            removed.lock().unwrap().insert(id);
                            assert!(!registry.snapshot().await.contains_key(&id));
                        } else {
                            kept.push(id);
                        }
                        tokio::task::yield_now().await;
                    }
                    kept
                })
            })
            .collect();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let removed = Arc::clone(&removed);
                let churning = Arc::clone(&churning);
                tokio::spawn(async move {
                    while churning.load(Ordering::SeqCst) {
                        let gone: HashSet<SessionId> = removed.lock().unwrap().clone();
                        let snapshot = registry.snapshot().await;
                        assert!(snapshot.keys().all(|id| !gone.contains(id)));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let mut kept = Vec::new();
        for w in workers {
            kept.extend(w.await.unwrap());
        }
        churning.store(false, Ordering::SeqCst);
        for r in readers {
            r.await.unwrap();
        }

        // Assert
        kept.sort();
        let remaining: Vec<SessionId> = registry.snapshot().await.into_keys().collect();
        assert_eq!(remaining, kept);
        assert_eq!(registry.len().await, 8 * 12);
    }
}
