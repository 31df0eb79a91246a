//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → rpc.rs        POST|GET /rpc/{key}  → relay call → response.rs
//!     → websocket.rs  GET /{key} (upgrade) → socket task ⇄ relay
//!     → status.rs     GET /_relay/status
//! ```

pub mod request;
pub mod response;
pub mod rpc;
pub mod server;
pub mod status;
pub mod websocket;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
