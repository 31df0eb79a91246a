//! Bound session: one live peer socket and the requests awaiting its replies.
//!
//! # Responsibilities
//! - Assign strictly increasing request numbers for the life of the binding
//! - Forward each accepted request as one `{number, body}` frame
//! - Correlate `{number, result}` replies back to the waiting caller
//! - Bound the number of requests awaiting a reply
//!
//! # Design Decisions
//! - Replies are matched by number, never by position
//! - A malformed reply closes the socket but fails nothing itself; the close
//!   event disposes the session, so each caller is answered exactly once
//! - Unknown numbers (stale, duplicate, forged) are logged and ignored

use std::collections::BTreeMap;

use crate::observability::metrics;
use crate::relay::envelope::{encode_request, parse_reply, parse_request};
use crate::relay::error::RelayError;
use crate::relay::eviction::OldestFirst;
use crate::relay::peer::{
    PeerSocket, CLOSE_GOING_AWAY, CLOSE_PROTOCOL_VIOLATION, CLOSE_SESSION_ENDED,
};
use crate::relay::sink::ResponseSink;

/// Requests forwarded to the peer, keyed by number.
struct InFlight<S> {
    entries: BTreeMap<u64, S>,
    max: usize,
}

impl<S> OldestFirst for InFlight<S> {
    type Evicted = (u64, S);

    fn over_budget(&self) -> bool {
        self.entries.len() > self.max
    }

    // Numbers only grow, so the lowest outstanding one is the oldest.
    fn pop_oldest(&mut self) -> Option<(u64, S)> {
        self.entries.pop_first()
    }
}

/// What happened to an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Matched and completed a waiting caller.
    Delivered,
    /// Well-formed but matched nothing outstanding.
    Unmatched,
    /// Malformed; the socket is being closed.
    Violation,
}

/// A session backed by a live peer socket.
pub struct Connector<S, P> {
    socket: P,
    next_id: u64,
    in_flight: InFlight<S>,
    violated: bool,
}

impl<S: ResponseSink, P: PeerSocket> Connector<S, P> {
    pub fn new(socket: P, max_in_flight: usize) -> Self {
        Self {
            socket,
            next_id: 0,
            in_flight: InFlight {
                entries: BTreeMap::new(),
                max: max_in_flight,
            },
            violated: false,
        }
    }

    /// Forward one request to the peer.
    pub fn request(&mut self, bytes: &[u8], sink: S) {
        let body = match parse_request(bytes) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed JSON-RPC request");
                sink.complete(Err(e));
                return;
            }
        };

        let number = self.next_id;
        self.next_id += 1;

        let frame = match encode_request(number, &body) {
            Ok(frame) => frame,
            Err(e) => {
                sink.complete(Err(RelayError::MalformedRequest(e.to_string())));
                return;
            }
        };

        self.in_flight.entries.insert(number, sink);

        let mut evicted_self = false;
        self.in_flight.evict_excess(|(evicted, sink)| {
            tracing::debug!(number = evicted, "Evicting in-flight request");
            metrics::record_eviction(RelayError::InFlightOverflow.kind());
            evicted_self |= evicted == number;
            sink.complete(Err(RelayError::InFlightOverflow));
        });

        if evicted_self {
            return;
        }

        self.socket.send_text(frame);
    }

    /// Handle one frame received from the peer.
    pub fn on_frame(&mut self, frame: &[u8]) -> FrameOutcome {
        if self.violated {
            return FrameOutcome::Violation;
        }

        let reply = match parse_reply(frame) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid frame from peer, closing socket");
                metrics::record_protocol_violation();
                self.violated = true;
                self.socket.close(CLOSE_PROTOCOL_VIOLATION, "protocol violation");
                return FrameOutcome::Violation;
            }
        };

        match self.in_flight.entries.remove(&reply.number) {
            Some(sink) => {
                sink.complete(Ok(reply.result));
                FrameOutcome::Delivered
            }
            None => {
                tracing::debug!(number = reply.number, "Unexpected reply");
                FrameOutcome::Unmatched
            }
        }
    }

    /// Fail every outstanding request with `reason`, then close the socket.
    ///
    /// A connector that saw a protocol violation fails its callers with
    /// [`RelayError::ProtocolViolation`] whatever the trigger.
    pub fn dispose(mut self, reason: RelayError) {
        let reason = if self.violated {
            RelayError::ProtocolViolation
        } else {
            reason
        };

        while let Some((_, sink)) = self.in_flight.pop_oldest() {
            sink.complete(Err(reason.clone()));
        }

        let code = match reason {
            RelayError::ShuttingDown => CLOSE_GOING_AWAY,
            RelayError::ProtocolViolation => CLOSE_PROTOCOL_VIOLATION,
            _ => CLOSE_SESSION_ENDED,
        };
        self.socket.close(code, "session ended");
    }

    /// Number of requests awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.entries.len()
    }

    /// Number the next forwarded request will carry.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}
