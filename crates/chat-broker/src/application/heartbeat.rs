//! HeartbeatMonitor: periodically probes every session and evicts dead ones.
//!
//! Every `interval` the monitor takes a snapshot of the registry and writes a
//! `connection_check` system frame to each session.  All probes of one sweep
//! run concurrently, so one slow client cannot delay the others.  A session
//! whose probe fails, or does not finish within one interval, is evicted: it
//! is removed from the registry and its connection is closed, which also
//! stops that session's handler.
//!
//! A peer that is gone but whose TCP stack still accepts writes (a half-open
//! connection with room in the send buffer) looks healthy to this check.
//! Detecting that case would need replies from the client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chat_core::{ServerFrame, SessionId, SystemNotice};
use futures_util::future::join_all;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::registry::Registry;
use super::session::SinkError;

/// Periodic liveness checker.
pub struct HeartbeatMonitor {
    registry: Arc<Registry>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Probes every online session once and evicts the ones that failed.
    ///
    /// Returns the ids that were evicted by this sweep.
    pub async fn sweep(&self) -> Vec<SessionId> {
        let sessions = self.registry.sessions().await;
        if sessions.is_empty() {
            return Vec::new();
        }

        let probe = ServerFrame::from(SystemNotice::connection_check());
        let probes = sessions.iter().map(|session| {
            let probe = &probe;
            async move {
                let result = match timeout(self.interval, session.send(probe)).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::TimedOut),
                };
                (session.id(), result)
            }
        });

        let mut evicted = Vec::new();
        for (id, result) in join_all(probes).await {
            if let Err(e) = result {
                warn!(session = %id, "heartbeat probe failed: {e}");
                if self.registry.evict(id).await {
                    evicted.push(id);
                }
            }
        }

        debug!(probed = sessions.len(), evicted = evicted.len(), "heartbeat sweep done");
        evicted
    }

    /// Runs sweeps every `interval` until `running` becomes `false`.
    ///
    /// The first sweep happens one full interval after start.
    pub async fn run(self, running: Arc<AtomicBool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "heartbeat started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if !running.load(Ordering::SeqCst) {
                break;
            }
            self.sweep().await;
        }

        info!("heartbeat stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::session::testing::RecordingSink;
    use super::super::session::{FrameSink, MockFrameSink};
    use super::*;

    fn monitor(registry: &Arc<Registry>) -> HeartbeatMonitor {
        HeartbeatMonitor::new(Arc::clone(registry), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sweep_probes_every_session() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let a = RecordingSink::new();
        let b = RecordingSink::new();
        registry.register("alice", a.clone()).await.unwrap();
        registry.register("bob", b.clone()).await.unwrap();

        // Act
        let evicted = monitor(&registry).sweep().await;

        // Assert
        assert!(evicted.is_empty());
        let expected = vec![ServerFrame::from(SystemNotice::connection_check())];
        assert_eq!(a.frames(), expected);
        assert_eq!(b.frames(), expected);
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_failed_sessions() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let healthy = RecordingSink::new();
        let dead = RecordingSink::failing();
        let alive_id = registry.register("alice", healthy.clone()).await.unwrap();
        let dead_id = registry.register("bob", dead.clone()).await.unwrap();

        // Act
        let evicted = monitor(&registry).sweep().await;

        // Assert
        assert_eq!(evicted, vec![dead_id]);
        assert!(dead.is_closed());
        assert!(registry.lookup(dead_id).await.is_none());
        assert!(registry.lookup(alive_id).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_on_empty_registry_is_noop() {
        let registry = Arc::new(Registry::new());

        let evicted = monitor(&registry).sweep().await;

        assert!(evicted.is_empty());
    }

    #[tokio::test]
    async fn test_session_that_starts_failing_is_evicted_on_next_sweep() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let sink = RecordingSink::new();
        let id = registry.register("carol", sink.clone()).await.unwrap();
        let monitor = monitor(&registry);

        // Act
        monitor.sweep().await;
        sink.set_failing(true);
        let evicted = monitor.sweep().await;

        // Assert
        assert_eq!(evicted, vec![id]);
        assert_eq!(sink.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_probe_with_mock_sink_that_errors_triggers_close() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let mut mock = MockFrameSink::new();
        mock.expect_is_closed().return_const(false);
        mock.expect_send()
            .times(1)
            .returning(|_| Err(SinkError::Closed));
        mock.expect_close().times(1).return_const(());
        let id = registry.register("mallory", Arc::new(mock)).await.unwrap();

        // Act
        let evicted = monitor(&registry).sweep().await;

        // Assert
        assert_eq!(evicted, vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_flag_cleared() {
        // Arrange
        let registry = Arc::new(Registry::new());
        let sink = RecordingSink::new();
        registry.register("alice", sink.clone()).await.unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(
            HeartbeatMonitor::new(Arc::clone(&registry), Duration::from_secs(5))
                .run(Arc::clone(&running)),
        );

        // Act: two full intervals, then stop
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        running.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(6)).await;

        // Assert
        task.await.unwrap();
        assert_eq!(sink.frames().len(), 2);
    }
}
