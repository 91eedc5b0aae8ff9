//! Connection registry and broadcast fan-out
//!
//! Tracks every open client connection by ID. Each entry holds the sending
//! half of that connection's outbound queue; a per-connection writer task
//! drains the queue into the WebSocket sink.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use uuid::Uuid;

use super::protocol::{ProtocolResult, ServerMessage};

/// Unique identity of a connection for its whole lifetime
pub type ConnectionId = Uuid;

/// Outbound queue feeding one connection's writer task
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Thread-safe set of live connections
///
/// Cloning is cheap and every clone shares the same set. Mutation and
/// broadcast iteration are serialized by the inner `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionSender>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection
    ///
    /// Returns `false` if the ID was already present, in which case the
    /// existing entry is kept.
    pub async fn add(&self, id: ConnectionId, sender: ConnectionSender) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&id) {
            return false;
        }
        connections.insert(id, sender);
        debug!("Registered connection {} ({} open)", id, connections.len());
        true
    }

    /// Deregister a connection
    ///
    /// Removing an absent connection is a no-op returning `false`.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(id).is_some();
        if removed {
            debug!("Deregistered connection {} ({} open)", id, connections.len());
        }
        removed
    }

    /// Whether the connection is registered
    #[cfg(test)]
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connections are registered
    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Send a message to every open connection
    ///
    /// The message is serialized once. Connections whose writer has already
    /// stopped are skipped. Returns the number of connections the payload
    /// was queued for.
    pub async fn broadcast(&self, message: &ServerMessage) -> ProtocolResult<usize> {
        let payload = message.to_json()?;
        let connections = self.connections.read().await;

        let mut delivered = 0;
        for (id, sender) in connections.iter() {
            if sender.is_closed() {
                trace!("Skipping closed connection {}", id);
                continue;
            }
            match sender.send(Message::Text(payload.clone())) {
                Ok(()) => delivered += 1,
                Err(_) => trace!("Connection {} closed during broadcast", id),
            }
        }

        debug!("Broadcast to {}/{} connections", delivered, connections.len());
        Ok(delivered)
    }
}
