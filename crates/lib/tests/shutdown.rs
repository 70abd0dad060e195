//! Graceful shutdown: connected participants are told, and the server returns.

use duet::config::Config;
use duet::gateway;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn next_text<S>(ws: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let fut = async {
        while let Some(msg) = ws.next().await {
            if let Message::Text(text) = msg.expect("read frame") {
                return serde_json::from_str::<Value>(&text).expect("event JSON");
            }
        }
        panic!("connection closed while waiting for an event");
    };
    tokio::time::timeout(WAIT, fut)
        .await
        .expect("timed out waiting for an event")
}

#[tokio::test]
async fn shutdown_is_broadcast_and_server_returns() {
    let port = free_port();
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(gateway::run_gateway_until(config, async move {
        let _ = stop_rx.await;
    }));

    let url = format!("ws://127.0.0.1:{}/ws", port);
    let mut ws = None;
    for _ in 0..100 {
        if let Ok((stream, _)) = tokio_tungstenite::connect_async(&url).await {
            ws = Some(stream);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let mut ws = ws.expect("gateway did not accept a connection");
    assert_eq!(next_text(&mut ws).await["event"], "connected");

    stop_tx.send(()).expect("server still waiting for shutdown");
    assert_eq!(next_text(&mut ws).await, json!({ "event": "shutdown" }));

    // The server side closes after the shutdown event.
    let rest = tokio::time::timeout(WAIT, async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                panic!("unexpected frame after shutdown: {}", text);
            }
        }
    })
    .await;
    assert!(rest.is_ok(), "connection stayed open after shutdown");

    let result = tokio::time::timeout(WAIT, server)
        .await
        .expect("gateway did not stop")
        .expect("gateway task panicked");
    assert!(result.is_ok(), "gateway returned an error: {:?}", result);
}
