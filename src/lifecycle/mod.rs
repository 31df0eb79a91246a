//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HttpServer stops accepting
//!             → relay disposes every session (waiting callers answered)
//!             → remaining HTTP connections drain → exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
