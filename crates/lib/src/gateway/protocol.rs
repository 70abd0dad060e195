//! Gateway WebSocket protocol: inbound client frames.
//!
//! Frames are `{ "event": <name>, "data": <payload> }`, the same framing used for
//! outbound events (see `crate::events`).

use crate::participant::{ParticipantId, SessionId};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or create) the named session.
    JoinSession(SessionId),
    /// Ask for the other members of the named session.
    ListPeers(SessionId),
    /// Forward an opaque negotiation payload to `target`.
    Signal(SignalEnvelope),
}

/// Signal as sent by a client: `{ "type", "target", ...opaque }`.
/// `target` is split off for addressing; everything else stays in `payload`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignalEnvelope {
    pub target: ParticipantId,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("binary frames are not supported")]
    Binary,
}

/// Parse one text frame from a client.
pub fn decode_client_frame(text: &str) -> Result<ClientMessage, FrameError> {
    Ok(serde_json::from_str(text)?)
}
