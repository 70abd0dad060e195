//! Outbound side of the channel transport, as seen by the registry.

use crate::events::ServerEvent;
use crate::participant::ParticipantId;
use async_trait::async_trait;

/// Delivery to individual participants. Implementations must not wait for the
/// peer to receive the event; delivery to a participant that is gone is a no-op.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Queue `event` for `to`. Silently dropped when `to` is not connected.
    async fn send(&self, to: &ParticipantId, event: ServerEvent);

    /// Whether `participant` still has an open connection.
    async fn is_connected(&self, participant: &ParticipantId) -> bool;
}
