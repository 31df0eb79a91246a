//! Response sinks: the still-open HTTP calls awaiting a relay outcome.

use serde_json::value::RawValue;
use tokio::sync::oneshot;

use crate::relay::error::RelayError;

/// Outcome delivered to a waiting caller: the peer's verbatim result, or a
/// relay-generated failure.
pub type Reply = Result<Box<RawValue>, RelayError>;

/// A caller waiting for exactly one [`Reply`].
///
/// `complete` consumes the sink, so completing twice does not type-check.
pub trait ResponseSink {
    /// Deliver the outcome.
    fn complete(self, reply: Reply);

    /// Whether the caller has already gone away (disconnect, timeout).
    fn is_closed(&self) -> bool {
        false
    }
}

impl ResponseSink for oneshot::Sender<Reply> {
    fn complete(self, reply: Reply) {
        // Receiver may be gone; the outcome is then simply unobserved.
        let _ = self.send(reply);
    }

    fn is_closed(&self) -> bool {
        oneshot::Sender::is_closed(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oneshot_sink_delivers() {
        let (tx, rx) = oneshot::channel::<Reply>();
        assert!(!ResponseSink::is_closed(&tx));
        tx.complete(Err(RelayError::ConnectionClosed));
        assert_eq!(rx.await.unwrap().unwrap_err(), RelayError::ConnectionClosed);
    }

    #[test]
    fn test_oneshot_sink_reports_abandoned_caller() {
        let (tx, rx) = oneshot::channel::<Reply>();
        drop(rx);
        assert!(ResponseSink::is_closed(&tx));
    }
}
