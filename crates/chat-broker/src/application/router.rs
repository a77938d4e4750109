//! Router: delivers one direct message from a sender to a receiver.
//!
//! ```text
//! deliver(sender, receiver, text)
//!   ├── sender not online        → Err(RouteError::SenderOffline)
//!   ├── receiver not online      → sender gets error "User does not exist"
//!   ├── write to receiver fails  → receiver is evicted, sender is not told
//!   └── otherwise                → receiver gets the relay frame
//! ```
//!
//! The router looks both sessions up in the [`Registry`], releases the
//! registry lock, then writes.  A slow receiver therefore never blocks lookups
//! by other handlers.

use std::sync::Arc;

use chat_core::{ChatRelay, SessionId, SystemNotice};
use thiserror::Error;
use tracing::{debug, warn};

use super::registry::Registry;
use super::session::SinkError;

/// Text of the error frame sent when the receiver id is not online.
pub const UNKNOWN_RECEIVER: &str = "User does not exist";

/// Errors that end the sender's connection.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The sender is no longer in the registry (it was evicted concurrently).
    #[error("sender {0} is no longer online")]
    SenderOffline(SessionId),

    /// The error frame could not be written back to the sender.
    #[error("could not notify sender: {0}")]
    SenderUnreachable(#[source] SinkError),
}

/// What happened to a message that did not end the sender's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The relay frame was written to the receiver.
    Delivered,
    /// No such receiver; the sender was sent an error frame.
    UnknownReceiver,
    /// Writing to the receiver failed and the receiver was evicted.
    ReceiverEvicted,
}

/// Routes direct messages between online sessions.
#[derive(Clone)]
pub struct Router {
    registry: Arc<Registry>,
}

impl Router {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Delivers `text` from `sender` to `receiver`.
    ///
    /// The relay carries the sender's registered id and nickname, never any
    /// value the client claimed.  A client may message itself.
    pub async fn deliver(
        &self,
        sender: SessionId,
        receiver: SessionId,
        text: String,
    ) -> Result<Delivery, RouteError> {
        let from = self
            .registry
            .lookup(sender)
            .await
            .ok_or(RouteError::SenderOffline(sender))?;

        let Some(to) = self.registry.lookup(receiver).await else {
            debug!(%sender, %receiver, "chat to unknown receiver");
            from.send(&SystemNotice::error(UNKNOWN_RECEIVER).into())
                .await
                .map_err(RouteError::SenderUnreachable)?;
            return Ok(Delivery::UnknownReceiver);
        };

        let relay = ChatRelay {
            sender_id: from.id(),
            sender_nickname: from.nickname().to_string(),
            message: text,
        };
        match to.send(&relay.into()).await {
            Ok(()) => {
                debug!(%sender, %receiver, "chat delivered");
                Ok(Delivery::Delivered)
            }
            Err(e) => {
                warn!(%sender, %receiver, "relay failed, evicting receiver: {e}");
                self.registry.evict(receiver).await;
                Ok(Delivery::ReceiverEvicted)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::session::testing::RecordingSink;
    use super::super::session::FrameSink;
    use super::*;
    use chat_core::ServerFrame;

    async fn setup() -> (Arc<Registry>, Router) {
        let registry = Arc::new(Registry::new());
        let router = Router::new(Arc::clone(&registry));
        (registry, router)
    }

    #[tokio::test]
    async fn test_deliver_relays_with_registered_identity() {
        // Arrange
        let (registry, router) = setup().await;
        let alice_sink = RecordingSink::new();
        let bob_sink = RecordingSink::new();
        let alice = registry.register("alice", alice_sink.clone()).await.unwrap();
        let bob = registry.register("bob", bob_sink.clone()).await.unwrap();

        // Act
        let outcome = router.deliver(alice, bob, "hi bob".to_string()).await.unwrap();

        // Assert
        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(
            bob_sink.frames(),
            vec![ServerFrame::from(ChatRelay {
                sender_id: alice,
                sender_nickname: "alice".to_string(),
                message: "hi bob".to_string(),
            })]
        );
        assert!(alice_sink.frames().is_empty(), "sender gets no acknowledgement");
    }

    #[tokio::test]
    async fn test_unknown_receiver_sends_error_to_sender() {
        // Arrange
        let (registry, router) = setup().await;
        let alice_sink = RecordingSink::new();
        let alice = registry.register("alice", alice_sink.clone()).await.unwrap();

        // Act
        let outcome = router
            .deliver(alice, SessionId::new(42), "anyone?".to_string())
            .await
            .unwrap();

        // Assert
        assert_eq!(outcome, Delivery::UnknownReceiver);
        assert_eq!(
            alice_sink.frames(),
            vec![ServerFrame::from(SystemNotice::error(UNKNOWN_RECEIVER))]
        );
    }

    #[tokio::test]
    async fn test_message_to_self_is_delivered() {
        let (registry, router) = setup().await;
        let sink = RecordingSink::new();
        let me = registry.register("solo", sink.clone()).await.unwrap();

        let outcome = router.deliver(me, me, "note to self".to_string()).await.unwrap();

        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(sink.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_relay_evicts_receiver_silently() {
        // Arrange
        let (registry, router) = setup().await;
        let alice_sink = RecordingSink::new();
        let bob_sink = RecordingSink::failing();
        let alice = registry.register("alice", alice_sink.clone()).await.unwrap();
        let bob = registry.register("bob", bob_sink.clone()).await.unwrap();

        // Act
        let outcome = router.deliver(alice, bob, "hello?".to_string()).await.unwrap();

        // Assert
        assert_eq!(outcome, Delivery::ReceiverEvicted);
        assert!(registry.lookup(bob).await.is_none());
        assert!(bob_sink.is_closed());
        assert!(alice_sink.frames().is_empty());
        assert!(registry.lookup(alice).await.is_some());
    }

    #[tokio::test]
    async fn test_offline_sender_is_an_error() {
        let (registry, router) = setup().await;
        let bob_sink = RecordingSink::new();
        let bob = registry.register("bob", bob_sink.clone()).await.unwrap();

        let result = router.deliver(SessionId::new(77), bob, "boo".to_string()).await;

        assert!(matches!(result, Err(RouteError::SenderOffline(id)) if id == SessionId::new(77)));
        assert!(bob_sink.frames().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_sender_is_an_error() {
        // Arrange: sender's own connection is broken
        let (registry, router) = setup().await;
        let alice = registry.register("alice", RecordingSink::failing()).await.unwrap();

        // Act
        let result = router.deliver(alice, SessionId::new(50), "x".to_string()).await;

        // Assert
        assert!(matches!(result, Err(RouteError::SenderUnreachable(_))));
    }
}
