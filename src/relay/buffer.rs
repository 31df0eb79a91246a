//! Unbound session: requests waiting for a peer socket to bind.
//!
//! # Responsibilities
//! - Hold requests in arrival order until a connector exists
//! - Bound the total bytes held, shedding the oldest entries first
//! - Replay every held request, in order, into a newly bound connector
//!
//! # Design Decisions
//! - Oversize requests are rejected outright and never buffered
//! - Oldest-first shedding keeps the newest arrivals: a caller that just
//!   failed can retry sooner than one that has waited longest
//! - Entries whose caller has gone away are dropped before budgeting

use std::collections::VecDeque;

use bytes::Bytes;

use crate::observability::metrics;
use crate::relay::connector::Connector;
use crate::relay::error::RelayError;
use crate::relay::eviction::OldestFirst;
use crate::relay::peer::PeerSocket;
use crate::relay::sink::ResponseSink;

/// One buffered request.
pub struct PendingEntry<S> {
    payload: Bytes,
    sink: S,
}

/// Byte-bounded FIFO of requests for a key with no socket yet.
pub struct PendingBuffer<S> {
    entries: VecDeque<PendingEntry<S>>,
    bytes: usize,
    max_bytes: usize,
}

impl<S> OldestFirst for PendingBuffer<S> {
    type Evicted = PendingEntry<S>;

    fn over_budget(&self) -> bool {
        self.bytes > self.max_bytes
    }

    fn pop_oldest(&mut self) -> Option<PendingEntry<S>> {
        let entry = self.entries.pop_front()?;
        self.bytes -= entry.payload.len();
        Some(entry)
    }
}

impl<S: ResponseSink> PendingBuffer<S> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    /// Queue a request, evicting older ones if the byte cap is exceeded.
    pub fn push(&mut self, payload: Bytes, sink: S) {
        if payload.len() > self.max_bytes {
            tracing::debug!(
                len = payload.len(),
                max_bytes = self.max_bytes,
                "Rejecting oversize request"
            );
            sink.complete(Err(RelayError::RequestTooLarge));
            return;
        }

        self.reap_abandoned();

        self.bytes += payload.len();
        self.entries.push_back(PendingEntry { payload, sink });

        self.evict_excess(|entry| {
            tracing::debug!(len = entry.payload.len(), "Evicting pending request");
            metrics::record_eviction(RelayError::PendingOverflow.kind());
            entry.sink.complete(Err(RelayError::PendingOverflow));
        });
    }

    /// Drop entries whose caller has gone away. Returns how many were dropped.
    pub fn reap_abandoned(&mut self) -> usize {
        let before = self.entries.len();
        let mut kept = VecDeque::with_capacity(before);
        for entry in self.entries.drain(..) {
            if entry.sink.is_closed() {
                self.bytes -= entry.payload.len();
                entry.sink.complete(Err(RelayError::Released));
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        before - self.entries.len()
    }

    /// Fail every buffered request with `reason`.
    pub fn dispose(mut self, reason: RelayError) {
        while let Some(entry) = self.pop_oldest() {
            entry.sink.complete(Err(reason.clone()));
        }
    }

    /// Replay every buffered request, in arrival order, into `connector`.
    pub fn drain_into<P: PeerSocket>(self, connector: &mut Connector<S, P>) {
        for entry in self.entries {
            connector.request(&entry.payload, entry.sink);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes currently buffered.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{call, Probe, RecordingSocket};

    fn sized(len: usize) -> Bytes {
        Bytes::from(vec![b' '; len])
    }

    #[test]
    fn test_oversize_rejected_and_not_buffered() {
        let mut buffer = PendingBuffer::new(10);
        let probe = Probe::default();
        buffer.push(sized(11), probe.sink());

        assert_eq!(probe.error(), Some(RelayError::RequestTooLarge));
        assert!(buffer.is_empty());
        assert_eq!(buffer.bytes(), 0);
    }

    #[test]
    fn test_exactly_at_cap_is_kept() {
        let mut buffer = PendingBuffer::new(10);
        let probe = Probe::default();
        buffer.push(sized(10), probe.sink());

        assert_eq!(probe.count(), 0);
        assert_eq!(buffer.bytes(), 10);
    }

    #[test]
    fn test_cumulative_overflow_evicts_oldest_first() {
        let mut buffer = PendingBuffer::new(10);
        let probes: Vec<Probe> = (0..4).map(|_| Probe::default()).collect();
        buffer.push(sized(4), probes[0].sink());
        buffer.push(sized(4), probes[1].sink());
        assert_eq!(buffer.bytes(), 8);

        // 8 + 4 > 10: the oldest goes.
        buffer.push(sized(4), probes[2].sink());
        assert_eq!(probes[0].error(), Some(RelayError::PendingOverflow));
        assert_eq!(buffer.bytes(), 8);

        // 8 + 9 > 10: both older entries go, the newest survives.
        buffer.push(sized(9), probes[3].sink());
        assert_eq!(probes[1].error(), Some(RelayError::PendingOverflow));
        assert_eq!(probes[2].error(), Some(RelayError::PendingOverflow));
        assert_eq!(probes[3].count(), 0);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.bytes(), 9);
    }

    #[test]
    fn test_abandoned_entries_free_their_budget() {
        let mut buffer = PendingBuffer::new(10);
        let gone = Probe::default();
        let waiting = Probe::default();
        buffer.push(sized(6), gone.sink());
        buffer.push(sized(3), waiting.sink());

        gone.abandon();
        let newest = Probe::default();
        buffer.push(sized(6), newest.sink());

        assert_eq!(gone.count(), 1);
        assert_eq!(waiting.count(), 0);
        assert_eq!(newest.count(), 0);
        assert_eq!(buffer.bytes(), 9);
    }

    #[test]
    fn test_dispose_fails_everything_once() {
        let mut buffer = PendingBuffer::new(100);
        let probes: Vec<Probe> = (0..3).map(|_| Probe::default()).collect();
        for probe in &probes {
            buffer.push(sized(5), probe.sink());
        }

        buffer.dispose(RelayError::SessionEvicted);
        for probe in &probes {
            assert_eq!(probe.count(), 1);
            assert_eq!(probe.error(), Some(RelayError::SessionEvicted));
        }
    }

    #[test]
    fn test_drain_replays_in_arrival_order() {
        let mut buffer = PendingBuffer::new(1024);
        let probes: Vec<Probe> = (0..3).map(|_| Probe::default()).collect();
        for (i, probe) in probes.iter().enumerate() {
            buffer.push(Bytes::from(call(i as u64 + 1)), probe.sink());
        }

        let socket = RecordingSocket::default();
        let mut connector = Connector::new(socket.clone(), 25);
        buffer.drain_into(&mut connector);

        assert_eq!(socket.numbers(), vec![0, 1, 2]);
        let ids: Vec<u64> = socket
            .sent()
            .iter()
            .map(|text| {
                let frame: serde_json::Value = serde_json::from_str(text).unwrap();
                frame["body"]["id"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(connector.in_flight(), 3);
    }
}
