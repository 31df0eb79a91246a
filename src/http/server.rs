//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, timeouts, request ID, CORS)
//! - Spawn the relay task and inject it into the handlers
//! - Bind server to listener and shut down in order: relay first, then
//!   the remaining HTTP connections

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::map_response,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::response::envelope_middleware_errors;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::rpc::rpc_handler;
use crate::http::status::get_status;
use crate::http::websocket::socket_handler;
use crate::relay::RelayHandle;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
    pub ping_interval_secs: u64,
    pub static_files: Option<ServeDir>,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
    relay: RelayHandle,
    relay_task: JoinHandle<()>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Spawns the relay task, so must be called inside a Tokio runtime.
    pub fn new(config: RelayConfig) -> Self {
        let (relay, relay_task) = RelayHandle::spawn(config.sessions.clone());

        let state = AppState {
            relay: relay.clone(),
            ping_interval_secs: config.socket.ping_interval_secs,
            static_files: config.http.static_root.as_ref().map(ServeDir::new),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            relay,
            relay_task,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/rpc/{key}", post(rpc_handler).get(rpc_handler))
            .route("/_relay/status", get(get_status))
            .route("/{key}", get(socket_handler));

        if let Some(files) = state.static_files.clone() {
            router = router.fallback_service(files);
        }

        let mut router = router
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.http.max_body_bytes));

        if config.timeouts.request_secs > 0 {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ));
        }

        router = router.layer(map_response(envelope_middleware_errors));

        if config.http.cors {
            router = router.layer(CorsLayer::permissive());
        }

        router
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, then dispose every session.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_sessions = self.config.sessions.max_sessions,
            max_in_flight = self.config.sessions.max_in_flight,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        // Waiting callers only finish once the relay answers them, so the
        // relay goes down before the server drains its connections.
        let relay = self.relay.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                relay.shutdown().await;
            })
            .await?;

        self.relay.shutdown().await;
        if let Err(e) = self.relay_task.await {
            tracing::error!(error = %e, "Relay task failed");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

}
