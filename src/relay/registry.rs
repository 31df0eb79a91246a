//! Session registry: opaque key → unbound buffer or bound connector.
//!
//! # Data Flow
//! ```text
//! HTTP request  → submit()  → Bound: connector.request()
//!                           → Unbound / absent: buffer.push()
//! Socket accept → bind()    → absent: fresh connector
//!                           → Unbound: connector + buffer replay
//!                           → Bound: newcomer closed
//! Socket frame  → on_frame()        → connector.on_frame()
//! Socket close  → release_binding() → session disposed
//! ```
//!
//! # Design Decisions
//! - At most `max_sessions` keys tracked; the least recently touched session
//!   is disposed to make room
//! - First-bound wins; a connector is never replaced or demoted
//! - Socket events carry the [`BindingId`] they were accepted with, so a
//!   stale socket can only affect the session it actually bound
//! - Unbound sessions whose every caller has gone away are reaped

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::relay::buffer::PendingBuffer;
use crate::relay::connector::{Connector, FrameOutcome};
use crate::relay::error::RelayError;
use crate::relay::eviction::OldestFirst;
use crate::relay::peer::{BindingId, PeerSocket, CLOSE_ALREADY_BOUND};
use crate::relay::sink::ResponseSink;

/// Live state for one key.
pub enum Session<S, P> {
    /// No socket yet; requests wait in the buffer.
    Unbound(PendingBuffer<S>),
    /// Backed by the socket accepted as `binding`.
    Bound {
        binding: BindingId,
        connector: Connector<S, P>,
    },
}

impl<S: ResponseSink, P: PeerSocket> Session<S, P> {
    /// Fail everything the session holds with `reason`.
    fn dispose(self, reason: RelayError) {
        match self {
            Session::Unbound(buffer) => buffer.dispose(reason),
            Session::Bound { connector, .. } => connector.dispose(reason),
        }
    }
}

/// Which state a key is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unbound,
    Bound,
}

/// Result of a bind attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// No prior session; an empty connector was registered.
    Fresh,
    /// Buffered requests were replayed into the new connector.
    Replayed(usize),
    /// Another socket already holds the key; the newcomer was closed.
    Rejected,
}

/// Point-in-time registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub bound: usize,
    pub unbound: usize,
    pub buffered_requests: usize,
    pub buffered_bytes: usize,
    pub in_flight: usize,
}

/// Sessions in least- to most-recently-touched order.
struct Directory<S, P> {
    sessions: IndexMap<String, Session<S, P>>,
    max: usize,
}

impl<S, P> OldestFirst for Directory<S, P> {
    type Evicted = (String, Session<S, P>);

    fn over_budget(&self) -> bool {
        self.sessions.len() > self.max
    }

    fn pop_oldest(&mut self) -> Option<Self::Evicted> {
        self.sessions.shift_remove_index(0)
    }
}

impl<S, P> Directory<S, P> {
    /// Mark `key` most recently used and return its session.
    fn touch(&mut self, key: &str) -> Option<&mut Session<S, P>> {
        let session = self.sessions.shift_remove(key)?;
        let (index, _) = self.sessions.insert_full(key.to_owned(), session);
        self.sessions.get_index_mut(index).map(|(_, session)| session)
    }
}

/// Directory of every tracked session.
pub struct SessionRegistry<S, P> {
    directory: Directory<S, P>,
    config: SessionConfig,
}

impl<S: ResponseSink, P: PeerSocket> SessionRegistry<S, P> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            directory: Directory {
                sessions: IndexMap::new(),
                max: config.max_sessions,
            },
            config,
        }
    }

    /// Route an HTTP request for `key`.
    pub fn submit(&mut self, key: &str, payload: Bytes, sink: S) {
        match self.directory.touch(key) {
            Some(Session::Bound { connector, .. }) => {
                tracing::debug!(key = %key, "Proxying request");
                connector.request(&payload, sink);
            }
            Some(Session::Unbound(buffer)) => {
                tracing::debug!(key = %key, "Queuing request");
                buffer.push(payload, sink);
            }
            None if !self.config.buffer_unbound => {
                tracing::debug!(key = %key, "No connection bound, rejecting request");
                sink.complete(Err(RelayError::NotConnected));
            }
            None => {
                tracing::debug!(key = %key, "Queuing request for new session");
                let mut buffer = PendingBuffer::new(self.config.max_buffered_bytes);
                buffer.push(payload, sink);
                // An oversize first request leaves nothing worth tracking.
                if !buffer.is_empty() {
                    self.insert(key.to_owned(), Session::Unbound(buffer));
                }
            }
        }
    }

    /// Bind the socket accepted as `binding` to `key`.
    pub fn bind(&mut self, key: &str, binding: BindingId, socket: P) -> BindOutcome {
        if matches!(self.directory.sessions.get(key), Some(Session::Bound { .. })) {
            tracing::warn!(key = %key, binding = %binding, "Key already bound, closing new socket");
            socket.close(CLOSE_ALREADY_BOUND, "already bound");
            metrics::record_binding("rejected");
            return BindOutcome::Rejected;
        }

        let mut connector = Connector::new(socket, self.config.max_in_flight);
        let outcome = match self.directory.sessions.shift_remove(key) {
            Some(Session::Unbound(buffer)) => {
                let replayed = buffer.len();
                buffer.drain_into(&mut connector);
                BindOutcome::Replayed(replayed)
            }
            _ => BindOutcome::Fresh,
        };

        tracing::info!(key = %key, binding = %binding, outcome = ?outcome, "Socket bound");
        metrics::record_binding(match outcome {
            BindOutcome::Replayed(_) => "replayed",
            _ => "fresh",
        });

        self.insert(key.to_owned(), Session::Bound { binding, connector });
        outcome
    }

    /// Deliver a frame received on the socket accepted as `binding`.
    ///
    /// Returns `None` if that socket no longer backs the key's session.
    pub fn on_frame(&mut self, key: &str, binding: BindingId, frame: &[u8]) -> Option<FrameOutcome> {
        match self.directory.sessions.get_mut(key) {
            Some(Session::Bound { binding: bound, connector }) if *bound == binding => {
                Some(connector.on_frame(frame))
            }
            _ => {
                tracing::debug!(key = %key, binding = %binding, "Frame from unbound socket ignored");
                None
            }
        }
    }

    /// Socket close/error path: dispose `key` only if `binding` backs it.
    pub fn release_binding(&mut self, key: &str, binding: BindingId) -> bool {
        let owns_key = matches!(
            self.directory.sessions.get(key),
            Some(Session::Bound { binding: bound, .. }) if *bound == binding
        );
        if !owns_key {
            tracing::debug!(key = %key, binding = %binding, "Close from socket that holds no session");
            return false;
        }

        tracing::debug!(key = %key, binding = %binding, "Deleting connection");
        if let Some(session) = self.directory.sessions.shift_remove(key) {
            session.dispose(RelayError::ConnectionClosed);
        }
        true
    }

    /// Explicit teardown of whatever session `key` holds.
    pub fn release(&mut self, key: &str) -> bool {
        match self.directory.sessions.shift_remove(key) {
            Some(session) => {
                tracing::debug!(key = %key, "Releasing session");
                session.dispose(RelayError::Released);
                true
            }
            None => false,
        }
    }

    /// Remove unbound sessions whose every caller has gone away.
    pub fn reap_abandoned(&mut self) -> usize {
        let before = self.directory.sessions.len();
        self.directory.sessions.retain(|key, session| match session {
            Session::Unbound(buffer) => {
                buffer.reap_abandoned();
                if buffer.is_empty() {
                    tracing::debug!(key = %key, "Reaping abandoned session");
                }
                !buffer.is_empty()
            }
            Session::Bound { .. } => true,
        });
        before - self.directory.sessions.len()
    }

    /// Dispose every session. Used on shutdown.
    pub fn dispose_all(&mut self) {
        let count = self.directory.sessions.len();
        for (_, session) in self.directory.sessions.drain(..) {
            session.dispose(RelayError::ShuttingDown);
        }
        tracing::info!(sessions = count, "Disposed all sessions");
    }

    pub fn state_of(&self, key: &str) -> Option<SessionState> {
        self.directory.sessions.get(key).map(|session| match session {
            Session::Unbound(_) => SessionState::Unbound,
            Session::Bound { .. } => SessionState::Bound,
        })
    }

    pub fn len(&self) -> usize {
        self.directory.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.sessions.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for session in self.directory.sessions.values() {
            match session {
                Session::Unbound(buffer) => {
                    stats.unbound += 1;
                    stats.buffered_requests += buffer.len();
                    stats.buffered_bytes += buffer.bytes();
                }
                Session::Bound { connector, .. } => {
                    stats.bound += 1;
                    stats.in_flight += connector.in_flight();
                }
            }
        }
        stats
    }

    fn insert(&mut self, key: String, session: Session<S, P>) {
        self.directory.sessions.insert(key, session);
        self.directory.evict_excess(|(key, session)| {
            tracing::debug!(key = %key, "Evicting connection");
            metrics::record_eviction(RelayError::SessionEvicted.kind());
            session.dispose(RelayError::SessionEvicted);
        });
    }
}
