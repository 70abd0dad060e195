//! In-memory session registry (join, route, list peers, leave).

use crate::events::{NotCoLocated, ServerEvent, SessionJoined};
use crate::participant::{ParticipantId, SessionId};
use crate::registry::session::Session;
use crate::registry::transport::PeerTransport;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maximum participants per session. Calls are strictly pairwise.
pub const SESSION_CAPACITY: usize = 2;

/// Accepted join: resulting member count and the joiner's own identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResult {
    pub session_id: SessionId,
    pub participant_count: usize,
    pub self_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Participant added; others in the session were notified.
    Joined(JoinResult),
    /// Participant was already in a session; nothing changed.
    AlreadyJoined(JoinResult),
    /// Session at capacity; requester was sent `session-full`.
    Full,
    /// Empty or blank session id.
    InvalidSession,
    /// Participant's connection closed before the join was processed.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// Target has no open connection; dropped without notice.
    TargetOffline,
    /// Sender and target do not share a session; sender was told.
    NotCoLocated,
}

/// Which targets a participant may signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoutingPolicy {
    /// Only members of the sender's own session.
    #[default]
    CoMembersOnly,
    /// Any connected participant.
    Open,
}

impl RoutingPolicy {
    pub fn from_require_co_membership(require: bool) -> Self {
        if require {
            Self::CoMembersOnly
        } else {
            Self::Open
        }
    }
}

/// Result of removing a participant from its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub session_id: SessionId,
    /// Members still in the session (each was sent `participant-left`).
    pub remaining: Vec<ParticipantId>,
    /// True when the session became empty and was deleted.
    pub session_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub sessions: usize,
    pub participants: usize,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, Session>,
    /// participant -> the one session it belongs to
    membership: HashMap<ParticipantId, SessionId>,
}

/// Registry of live call sessions. Cheap to clone; clones share state.
///
/// All operations run under one lock, so two joins racing for the last seat
/// in a session cannot both succeed. Notifications are queued while the lock
/// is held, which keeps their order consistent with the membership changes.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryState>>,
    policy: RoutingPolicy,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_policy(RoutingPolicy::default())
    }

    pub fn with_policy(policy: RoutingPolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryState::default())),
            policy,
        }
    }

    pub fn policy(&self) -> RoutingPolicy {
        self.policy
    }

    /// Add `participant` to `session_id`, creating the session if needed.
    ///
    /// On success the joiner is sent `session-joined` and every other member
    /// `participant-joined`. A full session answers `session-full`. A participant
    /// already in a session gets `session-joined` for its current session again.
    pub async fn join(
        &self,
        session_id: &str,
        participant: &ParticipantId,
        transport: &dyn PeerTransport,
    ) -> JoinOutcome {
        if session_id.trim().is_empty() {
            return JoinOutcome::InvalidSession;
        }
        let mut g = self.inner.write().await;
        if !transport.is_connected(participant).await {
            log::debug!("join: {} disconnected before join to {}", participant, session_id);
            return JoinOutcome::Disconnected;
        }
        let state = &mut *g;

        if let Some(current) = state.membership.get(participant) {
            let count = state.sessions.get(current).map_or(0, Session::len);
            let result = JoinResult {
                session_id: current.clone(),
                participant_count: count,
                self_id: participant.clone(),
            };
            log::debug!(
                "join: {} already in session {}, ignoring join to {}",
                participant,
                current,
                session_id
            );
            transport.send(participant, joined_event(&result)).await;
            return JoinOutcome::AlreadyJoined(result);
        }

        let count = state.sessions.get(session_id).map_or(0, Session::len);
        if count >= SESSION_CAPACITY {
            log::info!("session {} is full, rejecting {}", session_id, participant);
            transport.send(participant, ServerEvent::SessionFull).await;
            return JoinOutcome::Full;
        }

        let session = state
            .sessions
            .entry(session_id.to_string())
            .or_default();
        session.add(participant.clone());
        state
            .membership
            .insert(participant.clone(), session_id.to_string());

        let result = JoinResult {
            session_id: session_id.to_string(),
            participant_count: session.len(),
            self_id: participant.clone(),
        };
        log::info!(
            "{} joined session {} ({}/{})",
            participant,
            session_id,
            result.participant_count,
            SESSION_CAPACITY
        );
        transport.send(participant, joined_event(&result)).await;
        for peer in session.others(participant) {
            transport
                .send(peer, ServerEvent::ParticipantJoined(participant.clone()))
                .await;
        }
        JoinOutcome::Joined(result)
    }

    /// Forward `payload` from `sender` to `target` with `from` attached.
    ///
    /// The payload is opaque: only the addressing key `target` is removed and
    /// `from` set; every other field passes through untouched.
    pub async fn route(
        &self,
        sender: &ParticipantId,
        target: &ParticipantId,
        mut payload: Map<String, Value>,
        transport: &dyn PeerTransport,
    ) -> RouteOutcome {
        let g = self.inner.read().await;
        if !transport.is_connected(target).await {
            log::debug!("route: target {} not connected, dropping signal from {}", target, sender);
            return RouteOutcome::TargetOffline;
        }
        if self.policy == RoutingPolicy::CoMembersOnly {
            // A participant is never its own peer.
            let shared = sender != target
                && matches!(
                    (g.membership.get(sender), g.membership.get(target)),
                    (Some(a), Some(b)) if a == b
                );
            if !shared {
                log::warn!("route: {} and {} share no session, refusing signal", sender, target);
                transport
                    .send(
                        sender,
                        ServerEvent::NotCoLocated(NotCoLocated {
                            target: target.clone(),
                        }),
                    )
                    .await;
                return RouteOutcome::NotCoLocated;
            }
        }
        payload.remove("target");
        payload.insert("from".to_string(), Value::String(sender.to_string()));
        log::debug!(
            "route: signal {} from {} to {}",
            payload.get("type").and_then(Value::as_str).unwrap_or("?"),
            sender,
            target
        );
        transport.send(target, ServerEvent::Signal(payload)).await;
        RouteOutcome::Delivered
    }

    /// Members of `session_id` other than `requester`. Empty when the session does not exist.
    pub async fn list_peers(
        &self,
        session_id: &str,
        requester: &ParticipantId,
    ) -> Vec<ParticipantId> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.others(requester).cloned().collect())
            .unwrap_or_default()
    }

    /// Remove `participant` from its session, notify the remaining members, and
    /// delete the session when it becomes empty. `None` when it was in no session.
    pub async fn leave(
        &self,
        participant: &ParticipantId,
        transport: &dyn PeerTransport,
    ) -> Option<LeaveOutcome> {
        let mut g = self.inner.write().await;
        let state = &mut *g;
        let session_id = state.membership.remove(participant)?;
        let Some(session) = state.sessions.get_mut(&session_id) else {
            log::warn!("leave: membership pointed at missing session {}", session_id);
            return None;
        };
        session.remove(participant);
        let session_closed = session.is_empty();
        let remaining = session.members().to_vec();
        if session_closed {
            state.sessions.remove(&session_id);
            log::info!("{} left session {}; session closed", participant, session_id);
        } else {
            log::info!(
                "{} left session {} ({} remaining)",
                participant,
                session_id,
                remaining.len()
            );
        }
        for peer in &remaining {
            transport
                .send(peer, ServerEvent::ParticipantLeft(participant.clone()))
                .await;
        }
        Some(LeaveOutcome {
            session_id,
            remaining,
            session_closed,
        })
    }

    /// Members of `session_id` in arrival order (empty when absent).
    pub async fn members(&self, session_id: &str) -> Vec<ParticipantId> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .map(|s| s.members().to_vec())
            .unwrap_or_default()
    }

    /// Session the participant is in, if any.
    #[cfg(test)]
    pub(crate) async fn session_of(&self, participant: &ParticipantId) -> Option<SessionId> {
        self.inner.read().await.membership.get(participant).cloned()
    }

    #[cfg(test)]
    pub(crate) async fn contains_session(&self, session_id: &str) -> bool {
        self.inner.read().await.sessions.contains_key(session_id)
    }

    pub async fn stats(&self) -> RegistryStats {
        let g = self.inner.read().await;
        RegistryStats {
            sessions: g.sessions.len(),
            participants: g.membership.len(),
        }
    }
}

fn joined_event(result: &JoinResult) -> ServerEvent {
    ServerEvent::SessionJoined(SessionJoined {
        participant_count: result.participant_count,
        self_id: result.self_id.clone(),
    })
}
