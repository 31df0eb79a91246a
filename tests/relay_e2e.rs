//! End-to-end tests driving the relay over real HTTP and WebSocket connections.

use std::time::Duration;

use futures_util::SinkExt;
use rpc_relay::config::RelayConfig;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

mod common;

const CHAIN_ID: &str = r#"{"jsonrpc":"2.0","method":"eth_chainId","id":1,"params":[]}"#;

fn spawn_post(addr: std::net::SocketAddr, key: &'static str, body: &'static str) -> tokio::task::JoinHandle<(u16, String)> {
    tokio::spawn(async move { common::post_rpc(addr, key, body).await })
}

fn message(body: &str) -> Value {
    let parsed: Value = serde_json::from_str(body).unwrap();
    parsed["error"]["message"].clone()
}

#[tokio::test]
async fn test_buffered_request_replayed_on_bind() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let caller = spawn_post(addr, "abc", CHAIN_ID);
    common::wait_for(addr, |s| s["buffered_requests"] == 1).await;

    let mut peer = common::connect_peer(addr, "abc").await;
    let (number, body) = common::next_request(&mut peer).await;
    assert_eq!(number, 0);
    assert_eq!(body, serde_json::from_str::<Value>(CHAIN_ID).unwrap());

    peer.send(Message::text(
        r#"{"number":0,"result":{"jsonrpc":"2.0","id":1,"result":"0x539"}}"#,
    ))
    .await
    .unwrap();

    let (status, body) = caller.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"jsonrpc":"2.0","id":1,"result":"0x539"}"#);
}

#[tokio::test]
async fn test_bound_session_forwards_in_order() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let mut peer = common::connect_peer(addr, "live").await;
    common::wait_for(addr, |s| s["bound"] == 1).await;

    let first = spawn_post(addr, "live", r#"{"jsonrpc":"2.0","method":"eth_blockNumber","id":7}"#);
    let (n0, _) = common::next_request(&mut peer).await;
    let second = spawn_post(addr, "live", r#"[{"jsonrpc":"2.0","method":"net_version","id":8}]"#);
    let (n1, body) = common::next_request(&mut peer).await;
    assert_eq!((n0, n1), (0, 1));
    assert!(body.is_array());

    // Answer out of order.
    common::send_reply(&mut peer, 1, json!([{"jsonrpc":"2.0","id":8,"result":"1"}])).await;
    common::send_reply(&mut peer, 0, json!({"jsonrpc":"2.0","id":7,"result":"0x10"})).await;

    let (s1, b1) = second.await.unwrap();
    let (s0, b0) = first.await.unwrap();
    assert_eq!((s0, s1), (200, 200));
    assert_eq!(serde_json::from_str::<Value>(&b0).unwrap()["result"], "0x10");
    assert_eq!(serde_json::from_str::<Value>(&b1).unwrap()[0]["result"], "1");
}

#[tokio::test]
async fn test_second_socket_is_rejected() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let mut incumbent = common::connect_peer(addr, "dup").await;
    common::wait_for(addr, |s| s["bound"] == 1).await;

    let mut newcomer = common::connect_peer(addr, "dup").await;
    assert_eq!(common::next_close(&mut newcomer).await, Some(4409));

    let caller = spawn_post(addr, "dup", CHAIN_ID);
    let (number, _) = common::next_request(&mut incumbent).await;
    common::send_reply(&mut incumbent, number, json!({"jsonrpc":"2.0","id":1,"result":"0x1"})).await;

    let (status, _) = caller.await.unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_socket_close_fails_in_flight() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let mut peer = common::connect_peer(addr, "gone").await;
    common::wait_for(addr, |s| s["bound"] == 1).await;

    let caller = spawn_post(addr, "gone", CHAIN_ID);
    common::next_request(&mut peer).await;
    peer.close(None).await.unwrap();

    let (status, body) = caller.await.unwrap();
    assert_eq!(status, 504);
    assert_eq!(message(&body), "connection closed");
    common::wait_for(addr, |s| s["bound"] == 0).await;
}

#[tokio::test]
async fn test_protocol_violation_tears_down_socket() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let mut peer = common::connect_peer(addr, "bad").await;
    common::wait_for(addr, |s| s["bound"] == 1).await;

    let caller = spawn_post(addr, "bad", CHAIN_ID);
    common::next_request(&mut peer).await;
    peer.send(Message::text("definitely not a reply")).await.unwrap();

    assert_eq!(common::next_close(&mut peer).await, Some(4400));
    let (status, body) = caller.await.unwrap();
    assert_eq!(status, 400);
    assert_eq!(message(&body), "peer protocol violation");
}

#[tokio::test]
async fn test_oversize_request_is_413() {
    let mut config = RelayConfig::default();
    config.sessions.max_buffered_bytes = 32;
    let (addr, _shutdown) = common::start_relay(config).await;

    let (status, body) = common::post_rpc(addr, "tiny", CHAIN_ID).await;
    assert_eq!(status, 413);
    assert_eq!(message(&body), "request too large");

    let stats = common::status(addr).await;
    assert_eq!(stats["sessions"]["unbound"], 0);
}

#[tokio::test]
async fn test_shutdown_answers_waiting_callers() {
    let (addr, shutdown) = common::start_relay(RelayConfig::default()).await;

    let caller = spawn_post(addr, "late", CHAIN_ID);
    common::wait_for(addr, |s| s["buffered_requests"] == 1).await;

    shutdown.trigger();

    let (status, body) = tokio::time::timeout(Duration::from_secs(5), caller)
        .await
        .expect("caller never answered")
        .unwrap();
    assert_eq!(status, 504);
    assert_eq!(message(&body), "relay shutting down");
}

#[tokio::test]
async fn test_status_reports_version() {
    let (addr, _shutdown) = common::start_relay(RelayConfig::default()).await;

    let body = common::status(addr).await;
    assert_eq!(body["status"], "operational");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["sessions"]["in_flight"], 0);
}
