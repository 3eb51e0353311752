//! Per-arena broadcast fan-out
//!
//! Each arena owns one broadcaster; every connection in that arena
//! subscribes to it. State frames are full snapshots, so a subscriber that
//! lags and drops frames recovers on the next one. Nothing needs to be
//! replayed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::BROADCAST_CAPACITY;
use crate::protocol::ServerMessage;

/// Receiver half handed to each connection
pub type BroadcastReceiver = broadcast::Receiver<Arc<ServerMessage>>;

/// Fan-out of server messages to every connection in one arena
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Subscribe to receive this arena's frames
    fn subscribe(&self) -> BroadcastReceiver;

    /// Send a message to all subscribers
    async fn send(&self, msg: ServerMessage);

    /// Number of live subscribers
    fn subscriber_count(&self) -> usize;
}

/// In-memory broadcaster over a tokio broadcast channel
pub struct InMemoryBroadcaster {
    tx: broadcast::Sender<Arc<ServerMessage>>,
}

impl InMemoryBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }
}

impl Default for InMemoryBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for InMemoryBroadcaster {
    fn subscribe(&self) -> BroadcastReceiver {
        self.tx.subscribe()
    }

    async fn send(&self, msg: ServerMessage) {
        // Arc so the frame is serialized per subscriber, not cloned
        if let Err(e) = self.tx.send(Arc::new(msg)) {
            debug!("broadcast with no subscribers: {}", e);
        }
    }

    fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
