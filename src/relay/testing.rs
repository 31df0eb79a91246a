//! In-memory sinks and sockets for relay unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::relay::error::RelayError;
use crate::relay::peer::PeerSocket;
use crate::relay::sink::{Reply, ResponseSink};

/// Observes every completion of the sinks it hands out.
#[derive(Clone, Default)]
pub struct Probe {
    replies: Arc<Mutex<Vec<Reply>>>,
    abandoned: Arc<AtomicBool>,
}

impl Probe {
    pub fn sink(&self) -> ProbeSink {
        ProbeSink(self.clone())
    }

    /// Number of completions observed.
    pub fn count(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn result(&self) -> Option<String> {
        match self.replies.lock().unwrap().first() {
            Some(Ok(raw)) => Some(raw.get().to_string()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<RelayError> {
        match self.replies.lock().unwrap().first() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Simulate the HTTP caller going away.
    pub fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }
}

pub struct ProbeSink(Probe);

impl ResponseSink for ProbeSink {
    fn complete(self, reply: Reply) {
        self.0.replies.lock().unwrap().push(reply);
    }

    fn is_closed(&self) -> bool {
        self.0.abandoned.load(Ordering::SeqCst)
    }
}

/// Records frames sent and closes requested.
#[derive(Clone, Default)]
pub struct RecordingSocket {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<u16>>>,
}

impl RecordingSocket {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// `number` of every forwarded frame, in send order.
    pub fn numbers(&self) -> Vec<u64> {
        self.sent()
            .iter()
            .map(|text| {
                let frame: serde_json::Value = serde_json::from_str(text).unwrap();
                frame["number"].as_u64().unwrap()
            })
            .collect()
    }

    pub fn closes(&self) -> Vec<u16> {
        self.closes.lock().unwrap().clone()
    }
}

impl PeerSocket for RecordingSocket {
    fn send_text(&self, text: String) {
        self.sent.lock().unwrap().push(text);
    }

    fn close(&self, code: u16, _reason: &'static str) {
        self.closes.lock().unwrap().push(code);
    }
}

/// A minimal JSON-RPC call with the given id.
pub fn call(id: u64) -> Vec<u8> {
    format!(r#"{{"jsonrpc":"2.0","method":"eth_blockNumber","id":{id},"params":[]}}"#).into_bytes()
}

/// A peer reply frame for `number`.
pub fn reply(number: u64, id: u64) -> Vec<u8> {
    format!(r#"{{"number":{number},"result":{{"jsonrpc":"2.0","id":{id},"result":"0x{number:x}"}}}}"#)
        .into_bytes()
}
