//! Wire shapes exchanged with the HTTP caller and the peer socket.
//!
//! Payloads are kept as [`RawValue`] so request bodies and reply results are
//! forwarded byte-for-byte rather than re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::relay::error::RelayError;

/// JSON-RPC error code used for every relay-generated failure.
pub const INTERNAL_ERROR_CODE: i64 = -32603;

/// Server → peer frame.
#[derive(Debug, Serialize)]
pub struct RequestFrame<'a> {
    pub number: u64,
    pub body: &'a RawValue,
}

/// Peer → server frame.
#[derive(Debug, Deserialize)]
pub struct ReplyFrame {
    pub number: u64,
    pub result: Box<RawValue>,
}

/// Synthetic JSON-RPC error response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub jsonrpc: String,
    pub error: ErrorObject,
    pub id: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(reason: &RelayError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            error: ErrorObject {
                code: INTERNAL_ERROR_CODE,
                message: reason.to_string(),
            },
            id: None,
        }
    }
}

/// Parse an HTTP body as a JSON-RPC request (object) or batch (array).
pub fn parse_request(bytes: &[u8]) -> Result<Box<RawValue>, RelayError> {
    let raw: Box<RawValue> = serde_json::from_slice(bytes)
        .map_err(|e| RelayError::MalformedRequest(e.to_string()))?;

    if is_object_or_array(&raw) {
        Ok(raw)
    } else {
        Err(RelayError::MalformedRequest(
            "expected a JSON-RPC request or batch".to_string(),
        ))
    }
}

/// Parse a peer frame, requiring `{ "number": <uint>, "result": <object> }`.
pub fn parse_reply(frame: &[u8]) -> Result<ReplyFrame, String> {
    let reply: ReplyFrame = serde_json::from_slice(frame).map_err(|e| e.to_string())?;

    if is_object_or_array(&reply.result) {
        Ok(reply)
    } else {
        Err(format!("reply {} carries a non-object result", reply.number))
    }
}

/// Encode the frame forwarding request `number` to the peer.
pub fn encode_request(number: u64, body: &RawValue) -> Result<String, serde_json::Error> {
    serde_json::to_string(&RequestFrame { number, body })
}

// Batch responses arrive as arrays.
fn is_object_or_array(raw: &RawValue) -> bool {
    matches!(raw.get().trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}
