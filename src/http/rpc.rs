//! `POST|GET /rpc/{key}`: the HTTP side of the relay.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::response::json_response;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Relay the body to the peer bound for `key` and answer with its result.
pub async fn rpc_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers);

    tracing::debug!(
        request_id = %request_id,
        key = %key,
        method = %method,
        len = body.len(),
        "Received HTTP request"
    );

    let response = match state.relay.call(key, body).await {
        Ok(result) => json_response(StatusCode::OK, result.get().to_owned()),
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Relay call failed");
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}
