//! Relay status endpoint.
//!
//! # Responsibilities
//! - Report crate version and whether the relay task is still accepting events
//! - Expose registry counters (`GET /_relay/status`) for operators and `relay-cli`

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::relay::RegistryStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub sessions: Option<RegistryStats>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let sessions = state.relay.stats().await;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if sessions.is_some() { "operational" } else { "stopping" },
        sessions,
    })
}
