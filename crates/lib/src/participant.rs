//! Participant identity and the per-connection record held by the transport adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier chosen by the joining client (e.g. derived from the page path).
pub type SessionId = String;

/// Opaque identity minted by the transport when a connection opens. Unique for the
/// lifetime of that connection and never reused; a reconnect gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Mint a fresh identity (`p-<uuid>`).
    pub fn mint() -> Self {
        Self(format!("p-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// State of one live connection: its identity and the session it joined, if any.
/// Owned by the socket task; a connection that never joined skips `leave` on disconnect.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ParticipantId,
    pub session: Option<SessionId>,
}

impl Connection {
    pub fn new(id: ParticipantId) -> Self {
        Self { id, session: None }
    }
}
