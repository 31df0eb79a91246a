//! HTTP ⇄ socket relay core.
//!
//! # Data Flow
//! ```text
//! POST /rpc/{key}
//!     → actor.rs (single relay task, command queue)
//!     → registry.rs (key → session, global capacity)
//!         → buffer.rs (unbound: byte-bounded FIFO)
//!         → connector.rs (bound: number assignment, reply correlation)
//!     → peer.rs (outbound frames to the socket task)
//!
//! Socket reply
//!     → actor.rs → registry.rs → connector.rs → sink.rs (caller answered)
//! ```
//!
//! # Design Decisions
//! - Every caller is answered exactly once: by the peer's reply, by an
//!   eviction, or by session disposal
//! - Capacity is enforced oldest-first at three levels (eviction.rs)
//! - All wire shapes live in envelope.rs; all failures in error.rs

pub mod actor;
pub mod buffer;
pub mod connector;
pub mod envelope;
pub mod error;
pub mod eviction;
pub mod peer;
pub mod registry;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::RelayHandle;
pub use error::RelayError;
pub use peer::{BindingId, Outbound, SocketHandle};
pub use registry::{BindOutcome, RegistryStats, SessionRegistry, SessionState};
pub use sink::{Reply, ResponseSink};
