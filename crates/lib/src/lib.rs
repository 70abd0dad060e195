//! Duet core library: the call-session registry and the WebSocket gateway that
//! relays signaling between the two participants of a call.

pub mod config;
pub mod events;
pub mod gateway;
pub mod init;
pub mod participant;
pub mod registry;
