//! Session registry: which participants are in which call session.
//!
//! Sessions hold at most two participants. The registry emits its own
//! notifications (session-full, participant-joined, participant-left) through a
//! `PeerTransport` so the exclusion and capacity rules can be exercised without
//! a live socket.

mod session;
mod store;
mod transport;

pub use store::{
    JoinOutcome, JoinResult, LeaveOutcome, RegistryStats, RouteOutcome, RoutingPolicy,
    SessionRegistry, SESSION_CAPACITY,
};
pub use transport::PeerTransport;
