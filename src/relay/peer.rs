//! Peer socket seam and binding identity.
//!
//! # Responsibilities
//! - Define what the relay core needs from a peer socket (send, close)
//! - Mint a unique identity for every accepted socket
//! - Bridge the core to a socket task through an outbound queue
//!
//! # Design Decisions
//! - Close and error events are tagged with the [`BindingId`] minted at
//!   accept time, never re-resolved by key, so a socket that lost the
//!   binding race cannot tear down the session that won it

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Close code: peer sent a frame that is not a reply.
pub const CLOSE_PROTOCOL_VIOLATION: u16 = 4400;
/// Close code: another socket is already bound for this key.
pub const CLOSE_ALREADY_BOUND: u16 = 4409;
/// Close code: session disposed (released, evicted or closed).
pub const CLOSE_SESSION_ENDED: u16 = 4504;
/// Close code: relay shutting down ("going away").
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Relaxed ordering suffices: only uniqueness is needed.
static BINDING_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one accepted peer socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

impl BindingId {
    /// Mint a new unique binding ID.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(BINDING_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// Operations the relay performs on a peer socket.
///
/// Both are fire-and-forget: failures surface later as a close event.
pub trait PeerSocket {
    /// Queue one text frame.
    fn send_text(&self, text: String);

    /// Close the socket with `code`.
    fn close(&self, code: u16, reason: &'static str);
}

/// Instruction for a socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: &'static str },
}

/// [`PeerSocket`] backed by the queue of a socket task.
#[derive(Debug, Clone)]
pub struct SocketHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl SocketHandle {
    /// Create a handle and the receiver its socket task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PeerSocket for SocketHandle {
    fn send_text(&self, text: String) {
        if self.tx.send(Outbound::Text(text)).is_err() {
            tracing::trace!("Socket task gone, dropping outbound frame");
        }
    }

    fn close(&self, code: u16, reason: &'static str) {
        let _ = self.tx.send(Outbound::Close { code, reason });
    }
}
