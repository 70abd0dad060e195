//! Gateway HTTP + WebSocket server (single port).

use crate::config::Config;
use crate::events::{ServerEvent, Welcome};
use crate::gateway::hub::ConnectionHub;
use crate::gateway::protocol::{decode_client_frame, ClientMessage, FrameError};
use crate::participant::Connection;
use crate::registry::{
    JoinOutcome, PeerTransport, RouteOutcome, RoutingPolicy, SessionRegistry,
};
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;

pub const PROTOCOL_VERSION: u32 = 1;

/// Shared state for the gateway (config, registry, live connections).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub registry: SessionRegistry,
    pub hub: Arc<ConnectionHub>,
    /// Server-wide events for every socket (currently only shutdown).
    pub event_tx: broadcast::Sender<ServerEvent>,
}

/// Build gateway state from config: empty registry with the configured routing policy.
pub fn build_state(config: Config) -> GatewayState {
    let policy = RoutingPolicy::from_require_co_membership(config.relay.require_co_membership);
    let (event_tx, _) = broadcast::channel(16);
    GatewayState {
        config: Arc::new(config),
        registry: SessionRegistry::with_policy(policy),
        hub: Arc::new(ConnectionHub::new()),
        event_tx,
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/ice", get(ice_http))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    run_gateway_until(config, os_shutdown_signal()).await
}

/// Run the gateway until `shutdown` completes. Every connected socket is then
/// sent `shutdown` and closed, and the server drains before returning.
pub async fn run_gateway_until<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind = config.gateway.bind.trim().to_string();
    let port = config.gateway.port;
    log::info!("ice servers for clients: {}", config.ice.servers.join(", "));
    let state = build_state(config);
    if state.registry.policy() == RoutingPolicy::Open {
        log::warn!("relay.requireCoMembership is off: signals are forwarded to any connected participant");
    }
    let event_tx = state.event_tx.clone();
    let app = router(state);

    let host = bind.trim_start_matches('[').trim_end_matches(']');
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding to {}:{}", bind, port))?;
    log::info!("gateway listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            log::info!("shutdown requested, notifying participants and draining connections");
            let _ = event_tx.send(ServerEvent::Shutdown);
        })
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn os_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let stats = state.registry.stats().await;
    Json(json!({
        "runtime": "running",
        "protocol": PROTOCOL_VERSION,
        "port": state.config.gateway.port,
        "sessions": stats.sessions,
        "participants": stats.participants,
        "connections": state.hub.connection_count().await,
    }))
}

/// GET /ice returns the STUN/TURN URLs clients should use.
async fn ice_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({ "iceServers": state.config.ice.servers }))
}

/// GET /ws upgrades to WebSocket. The first frame sent is `connected` with the participant id.
async fn ws_handler(State(state): State<GatewayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState) {
    let (id, mut outbound_rx) = state.hub.connect().await;
    let mut conn = Connection::new(id);
    let mut event_rx = state.event_tx.subscribe();
    log::info!("participant connected: {}", conn.id);

    let welcome = ServerEvent::Connected(Welcome {
        self_id: conn.id.clone(),
        ice_servers: state.config.ice.servers.clone(),
    });
    state.hub.send(&conn.id, welcome).await;

    loop {
        tokio::select! {
            biased;

            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        let is_shutdown = event == ServerEvent::Shutdown;
                        let _ = socket.send(Message::Text(event.to_frame())).await;
                        if is_shutdown {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("ws client lagged {} broadcast messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            Some(event) = outbound_rx.recv() => {
                if socket.send(Message::Text(event.to_frame())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Binary(_) => {
                        reject_frame(&state, &conn, FrameError::Binary).await;
                        continue;
                    }
                    Message::Close(_) => break,
                    _ => continue,
                };
                match decode_client_frame(&text) {
                    Ok(message) => handle_client_message(&state, &mut conn, message).await,
                    Err(e) => reject_frame(&state, &conn, e).await,
                }
            }
        }
    }

    // Unregister before leaving so a join still in flight for this id is refused.
    state.hub.disconnect(&conn.id).await;
    if conn.session.is_none() {
        log::info!("participant disconnected: {} (never joined)", conn.id);
        return;
    }
    match state.registry.leave(&conn.id, state.hub.as_ref()).await {
        Some(outcome) => log::info!(
            "participant disconnected: {} (left session {})",
            conn.id,
            outcome.session_id
        ),
        None => log::info!("participant disconnected: {}", conn.id),
    }
}

async fn reject_frame(state: &GatewayState, conn: &Connection, err: FrameError) {
    log::warn!("rejecting frame from {}: {}", conn.id, err);
    state.hub.send(&conn.id, ServerEvent::error(err.to_string())).await;
}

/// Dispatch one decoded client message to the registry.
async fn handle_client_message(state: &GatewayState, conn: &mut Connection, message: ClientMessage) {
    let hub: &dyn PeerTransport = state.hub.as_ref();
    match message {
        ClientMessage::JoinSession(session_id) => {
            log::debug!("{} attempting to join session {}", conn.id, session_id);
            match state.registry.join(&session_id, &conn.id, hub).await {
                JoinOutcome::Joined(result) | JoinOutcome::AlreadyJoined(result) => {
                    conn.session = Some(result.session_id);
                }
                JoinOutcome::InvalidSession => {
                    hub.send(&conn.id, ServerEvent::error("session id must not be empty"))
                        .await;
                }
                JoinOutcome::Full | JoinOutcome::Disconnected => {}
            }
        }
        ClientMessage::ListPeers(session_id) => {
            let peers = state.registry.list_peers(&session_id, &conn.id).await;
            hub.send(&conn.id, ServerEvent::PeerList(peers)).await;
        }
        ClientMessage::Signal(envelope) => {
            let outcome = state
                .registry
                .route(&conn.id, &envelope.target, envelope.payload, hub)
                .await;
            if outcome != RouteOutcome::Delivered {
                log::debug!(
                    "signal from {} to {} not delivered: {:?}",
                    conn.id,
                    envelope.target,
                    outcome
                );
            }
        }
    }
}
