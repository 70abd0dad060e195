//! Gateway: HTTP + WebSocket transport for the session registry.
//!
//! Single port serves HTTP and WebSocket. Every connection is issued a participant
//! id and receives a `connected` event first; after that the client sends
//! `join-session`, `list-peers` and `signal` frames.

mod hub;
mod protocol;
mod server;

pub use hub::ConnectionHub;
pub use protocol::{decode_client_frame, ClientMessage, FrameError, SignalEnvelope};
pub use server::{
    build_state, router, run_gateway, run_gateway_until, GatewayState, PROTOCOL_VERSION,
};
