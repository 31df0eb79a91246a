//! HTTP ⇄ WebSocket JSON-RPC relay (v1)
//!
//! Lets a plain HTTP JSON-RPC endpoint drive a peer that is only reachable
//! through one long-lived WebSocket it opened itself, identified by an
//! opaque session key.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌────────────────────────────────────────────────┐
//!                       │                    RELAY                        │
//!   POST /rpc/{key}     │  ┌──────────┐    ┌────────────┐                 │
//!   ────────────────────┼─▶│ http/rpc │───▶│ relay task │                 │
//!   ◀───────────────────┼──│          │◀───│ (registry) │                 │
//!   200 / 4xx / 5xx     │  └──────────┘    └─────┬──────┘                 │
//!                       │                        │ ▲                      │
//!                       │                        ▼ │                      │
//!   GET /{key} (ws)     │  ┌──────────────────────────┐                   │
//!   ◀═══════════════════┼══│ http/websocket (per peer)│                   │
//!   {number, body} ⇄    │  └──────────────────────────┘                   │
//!   {number, result}    │                                                 │
//!                       │  config · observability · lifecycle             │
//!                       └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_relay::config::loader::load_config;
use rpc_relay::http::HttpServer;
use rpc_relay::lifecycle::{signals, Shutdown};
use rpc_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "rpc-relay")]
#[command(about = "Relay HTTP JSON-RPC calls to peers connected over WebSocket", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (e.g. 0.0.0.0:3000).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("rpc-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_sessions = config.sessions.max_sessions,
        max_in_flight = config.sessions.max_in_flight,
        max_buffered_bytes = config.sessions.max_buffered_bytes,
        buffer_unbound = config.sessions.buffer_unbound,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    let server = HttpServer::new(config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
