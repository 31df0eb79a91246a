//! Peer socket handling.
//!
//! # Responsibilities
//! - Accept WebSocket upgrades on `GET /{key}`
//! - Mint a binding identity and offer the socket to the relay
//! - Pump frames: relay → socket (requests, close) and socket → relay (replies)
//! - Keep the connection alive with periodic pings
//! - Report close/error to the relay exactly once
//!
//! # Data Flow
//! ```text
//! relay task ──Outbound──→ socket task ──frames──→ peer
//! relay task ←──Frame/Closed── socket task ←──frames── peer
//! ```
//!
//! # Design Decisions
//! - Non-upgrade GETs on the same path fall through to static files
//! - Text and binary frames are both handed to the relay as JSON bytes

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        ConnectInfo, FromRequestParts, Path, State,
    },
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::MissedTickBehavior;
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::http::server::AppState;
use crate::relay::{BindingId, Outbound, RelayHandle, SocketHandle};

/// Upgrade to a peer socket for `key`, or serve a static file.
pub async fn socket_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (mut parts, body) = request.into_parts();

    match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => {
            tracing::info!(key = %key, peer_addr = %peer_addr, "Incoming WebSocket");
            let relay = state.relay.clone();
            let ping_every = Duration::from_secs(state.ping_interval_secs);
            upgrade.on_upgrade(move |socket| drive_socket(socket, key, relay, ping_every))
        }
        Err(rejection) => match state.static_files.clone() {
            Some(files) => serve_static(files, Request::from_parts(parts, body)).await,
            None => rejection.into_response(),
        },
    }
}

pub async fn serve_static(files: ServeDir, request: Request<Body>) -> Response {
    match files.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Own one upgraded socket until either side closes it.
pub async fn drive_socket(socket: WebSocket, key: String, relay: RelayHandle, ping_every: Duration) {
    let binding = BindingId::new();
    let (handle, mut outbound) = SocketHandle::channel();
    relay.bind(key.clone(), binding, handle);

    let (mut tx, mut rx) = socket.split();

    let mut ping = tokio::time::interval_at(tokio::time::Instant::now() + ping_every, ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = tx.send(Message::Text(text.into())).await {
                        tracing::debug!(key = %key, binding = %binding, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    tracing::debug!(key = %key, binding = %binding, code, reason, "Closing WebSocket");
                    let frame = CloseFrame {
                        code,
                        reason: Utf8Bytes::from_static(reason),
                    };
                    let _ = tx.send(Message::Close(Some(frame))).await;
                    break;
                }
                // Relay stopped and dropped our handle.
                None => break,
            },
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    relay.frame(key.clone(), binding, text.as_str().as_bytes().to_vec());
                }
                Some(Ok(Message::Binary(data))) => {
                    relay.frame(key.clone(), binding, data.to_vec());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(key = %key, binding = %binding, error = %e, "WebSocket error");
                    break;
                }
            },
            _ = ping.tick() => {
                if tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(key = %key, binding = %binding, "WebSocket closed");
    relay.closed(key, binding);
}
