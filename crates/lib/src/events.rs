//! Events the relay emits to participants.
//!
//! Each event is one JSON object `{ "event": <name>, "data": <payload> }`;
//! `data` is absent for events without a payload (e.g. `session-full`).

use crate::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// First frame on every connection.
    Connected(Welcome),
    /// Join accepted (or repeated join answered with current state).
    SessionJoined(SessionJoined),
    /// Join rejected: the session already has two participants.
    SessionFull,
    /// A new peer entered the caller's session.
    ParticipantJoined(ParticipantId),
    /// Reply to `list-peers`: every member except the requester.
    PeerList(Vec<ParticipantId>),
    /// Forwarded negotiation payload with `from` attached.
    Signal(Map<String, Value>),
    /// A signal was refused because the target is not in the sender's session.
    NotCoLocated(NotCoLocated),
    /// A peer disconnected from the caller's session.
    ParticipantLeft(ParticipantId),
    Error(ErrorPayload),
    /// The server is stopping; the connection will close.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub self_id: ParticipantId,
    /// STUN/TURN URLs for the client's peer connection.
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionJoined {
    pub participant_count: usize,
    pub self_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotCoLocated {
    pub target: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::SessionJoined(_) => "session-joined",
            Self::SessionFull => "session-full",
            Self::ParticipantJoined(_) => "participant-joined",
            Self::PeerList(_) => "peer-list",
            Self::Signal(_) => "signal",
            Self::NotCoLocated(_) => "not-co-located",
            Self::ParticipantLeft(_) => "participant-left",
            Self::Error(_) => "error",
            Self::Shutdown => "shutdown",
        }
    }

    /// Encode as a text frame.
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"error","data":{"message":"encoding failed"}}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_joined_uses_camel_case() {
        let ev = ServerEvent::SessionJoined(SessionJoined {
            participant_count: 2,
            self_id: ParticipantId::from("p-b"),
        });
        let v: Value = serde_json::from_str(&ev.to_frame()).unwrap();
        assert_eq!(
            v,
            json!({ "event": "session-joined", "data": { "participantCount": 2, "selfId": "p-b" } })
        );
    }

    #[test]
    fn unit_events_have_no_data() {
        let v: Value = serde_json::from_str(&ServerEvent::SessionFull.to_frame()).unwrap();
        assert_eq!(v, json!({ "event": "session-full" }));
    }

    #[test]
    fn peer_events_carry_bare_id() {
        let v: Value =
            serde_json::from_str(&ServerEvent::ParticipantLeft(ParticipantId::from("p-a")).to_frame())
                .unwrap();
        assert_eq!(v, json!({ "event": "participant-left", "data": "p-a" }));
    }

    #[test]
    fn name_matches_wire_tag() {
        let ev = ServerEvent::NotCoLocated(NotCoLocated {
            target: ParticipantId::from("p-x"),
        });
        let v: Value = serde_json::from_str(&ev.to_frame()).unwrap();
        assert_eq!(v["event"], ev.name());
    }
}
