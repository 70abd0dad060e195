//! Live connections: participant id -> outbound event queue.

use crate::events::ServerEvent;
use crate::participant::ParticipantId;
use crate::registry::PeerTransport;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

/// Outbound queues of every open WebSocket. Queues are unbounded so a send never
/// waits on a slow peer; each socket task drains its own queue.
pub struct ConnectionHub {
    connections: RwLock<HashMap<ParticipantId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection under a freshly minted id.
    pub async fn connect(&self) -> (ParticipantId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ParticipantId::mint();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Drop the connection's queue; later sends to it become no-ops.
    pub async fn disconnect(&self, id: &ParticipantId) -> bool {
        self.connections.write().await.remove(id).is_some()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl PeerTransport for ConnectionHub {
    async fn send(&self, to: &ParticipantId, event: ServerEvent) {
        let g = self.connections.read().await;
        let Some(tx) = g.get(to) else {
            log::debug!("hub: {} not connected, dropping {}", to, event.name());
            return;
        };
        if tx.send(event).is_err() {
            log::debug!("hub: queue for {} closed", to);
        }
    }

    async fn is_connected(&self, participant: &ParticipantId) -> bool {
        self.connections.read().await.contains_key(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_reaches_only_the_addressed_connection() {
        let hub = ConnectionHub::new();
        let (a, mut rx_a) = hub.connect().await;
        let (_b, mut rx_b) = hub.connect().await;
        hub.send(&a, ServerEvent::SessionFull).await;
        assert_eq!(rx_a.recv().await, Some(ServerEvent::SessionFull));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_after_disconnect_is_noop() {
        let hub = ConnectionHub::new();
        let (a, mut rx_a) = hub.connect().await;
        assert!(hub.is_connected(&a).await);
        assert!(hub.disconnect(&a).await);
        assert!(!hub.is_connected(&a).await);
        hub.send(&a, ServerEvent::SessionFull).await;
        assert_eq!(rx_a.recv().await, None);
        assert_eq!(hub.connection_count().await, 0);
    }
}
