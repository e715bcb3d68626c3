//! JSON response envelope used by every API route.
//!
//! Successful responses are `{"ok": true, "data": ...}`, failures are
//! `{"ok": false, "error": "..."}` with an appropriate status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

/// 200 OK with data.
pub fn success<T: Serialize>(data: T) -> Response {
    success_with(StatusCode::OK, data)
}

/// Success with an explicit status code (e.g. 201 Created).
pub fn success_with<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "ok": true, "data": data }))).into_response()
}

/// Error with an explicit status code.
pub fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}

/// 400 Bad Request.
pub fn bad_request(message: &str) -> Response {
    error(StatusCode::BAD_REQUEST, message)
}

/// 401 Unauthorized.
pub fn unauthorized() -> Response {
    error(StatusCode::UNAUTHORIZED, "Unauthorized")
}

/// 403 Forbidden.
pub fn forbidden(message: &str) -> Response {
    error(StatusCode::FORBIDDEN, message)
}

/// 404 Not Found.
pub fn not_found(message: &str) -> Response {
    error(StatusCode::NOT_FOUND, message)
}

/// 409 Conflict.
pub fn conflict(message: &str) -> Response {
    error(StatusCode::CONFLICT, message)
}

/// 500 Internal Server Error. Logs the underlying cause, returns a generic
/// message to the client.
pub fn internal_error(err: &anyhow::Error) -> Response {
    tracing::error!(error = %err, "Internal server error");
    error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
