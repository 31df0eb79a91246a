//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rpc_relay::config::RelayConfig;
use rpc_relay::http::HttpServer;
use rpc_relay::lifecycle::Shutdown;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay on an ephemeral port.
pub async fn start_relay(config: RelayConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// POST `body` to `/rpc/{key}` and return status plus parsed JSON.
pub async fn post_rpc(addr: SocketAddr, key: &str, body: &str) -> (u16, String) {
    let res = client()
        .post(format!("http://{}/rpc/{}", addr, key))
        .header("content-type", "application/json")
        .body(body.to_string())
        .send()
        .await
        .expect("relay unreachable");
    let status = res.status().as_u16();
    (status, res.text().await.unwrap())
}

pub async fn status(addr: SocketAddr) -> Value {
    client()
        .get(format!("http://{}/_relay/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll `/_relay/status` until `check` holds for the session stats.
pub async fn wait_for<F>(addr: SocketAddr, check: F)
where
    F: Fn(&Value) -> bool,
{
    for _ in 0..200 {
        let body = status(addr).await;
        if check(&body["sessions"]) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never reached the expected state");
}

pub async fn connect_peer(addr: SocketAddr, key: &str) -> Peer {
    let (ws, _) = connect_async(format!("ws://{}/{}", addr, key))
        .await
        .expect("upgrade failed");
    ws
}

/// Next `{number, body}` frame sent by the relay.
pub async fn next_request(peer: &mut Peer) -> (u64, Value) {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), peer.next())
            .await
            .expect("no frame from relay")
            .expect("socket ended")
            .unwrap();
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(text.as_str()).unwrap();
            return (frame["number"].as_u64().unwrap(), frame["body"].clone());
        }
    }
}

pub async fn send_reply(peer: &mut Peer, number: u64, result: Value) {
    let frame = serde_json::json!({ "number": number, "result": result });
    peer.send(Message::text(frame.to_string())).await.unwrap();
}

/// Close code the relay sent, skipping any data frames first.
pub async fn next_close(peer: &mut Peer) -> Option<u16> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), peer.next())
            .await
            .expect("relay never closed the socket");
        match msg {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
