//! Response construction.
//!
//! # Responsibilities
//! - Return proxied results verbatim as `application/json`
//! - Map relay failures to HTTP status codes and the JSON-RPC error envelope
//! - Rewrite body-limit and timeout responses from the middleware stack into
//!   the same envelope

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::relay::envelope::ErrorEnvelope;
use crate::relay::RelayError;

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorEnvelope::new(&self))).into_response()
    }
}

/// Middleware answers (body limit, request timeout) carry no JSON body;
/// replace them with the relay's envelope.
pub async fn envelope_middleware_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|v| v.as_bytes().starts_with(b"application/json"));
    if is_json {
        return response;
    }

    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => RelayError::RequestTooLarge.into_response(),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            RelayError::TimedOut.into_response()
        }
        _ => response,
    }
}

/// A JSON body that is already serialized.
pub fn json_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
