//! Relay-generated failures.
//!
//! Every way a relay call can end without a proxied result is one variant
//! here. The display text becomes the `message` of the JSON-RPC error
//! envelope delivered to the HTTP caller, so each cause reads differently.

use axum::http::StatusCode;
use thiserror::Error;

/// Terminal error delivered to a response sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Request body is not a JSON-RPC request or batch.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Single request larger than the pending buffer's byte cap.
    #[error("request too large")]
    RequestTooLarge,

    /// Evicted from an unbound session's buffer to stay under its byte cap.
    #[error("too many pending requests")]
    PendingOverflow,

    /// Evicted from a bound session's in-flight table.
    #[error("too many in-flight requests")]
    InFlightOverflow,

    /// Session removed from the registry to make room for another.
    #[error("session evicted")]
    SessionEvicted,

    /// Peer socket closed or errored before the reply arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Peer sent a frame that is not a reply; its socket was torn down.
    #[error("peer protocol violation")]
    ProtocolViolation,

    /// Session torn down on request.
    #[error("session released")]
    Released,

    /// No connector is bound for the key and buffering is disabled.
    #[error("no connection for session")]
    NotConnected,

    /// Caller waited longer than the configured request timeout.
    #[error("request timed out")]
    TimedOut,

    /// Relay stopped before the call completed.
    #[error("relay shutting down")]
    ShuttingDown,
}

impl RelayError {
    /// HTTP status the caller sees for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MalformedRequest(_) | RelayError::ProtocolViolation => {
                StatusCode::BAD_REQUEST
            }
            RelayError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::NotConnected => StatusCode::BAD_GATEWAY,
            RelayError::PendingOverflow
            | RelayError::InFlightOverflow
            | RelayError::SessionEvicted
            | RelayError::ConnectionClosed
            | RelayError::Released
            | RelayError::TimedOut
            | RelayError::ShuttingDown => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MalformedRequest(_) => "malformed_request",
            RelayError::RequestTooLarge => "request_too_large",
            RelayError::PendingOverflow => "pending_overflow",
            RelayError::InFlightOverflow => "in_flight_overflow",
            RelayError::SessionEvicted => "session_evicted",
            RelayError::ConnectionClosed => "connection_closed",
            RelayError::ProtocolViolation => "protocol_violation",
            RelayError::Released => "released",
            RelayError::NotConnected => "not_connected",
            RelayError::TimedOut => "timed_out",
            RelayError::ShuttingDown => "shutting_down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            RelayError::MalformedRequest("eof".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::ProtocolViolation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(RelayError::RequestTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(RelayError::NotConnected.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(RelayError::InFlightOverflow.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(RelayError::ConnectionClosed.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(RelayError::TimedOut.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_eviction_messages_are_distinct() {
        let messages = [
            RelayError::PendingOverflow.to_string(),
            RelayError::InFlightOverflow.to_string(),
            RelayError::SessionEvicted.to_string(),
            RelayError::ConnectionClosed.to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
