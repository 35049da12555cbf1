use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware::Next, response::Response};

use crate::app::errors::json_error;

/// Per-request deadline.
///
/// When it fires the handler future is dropped, which rolls back any open
/// ledger unit of work; the client gets a 504 and may retry with the same
/// idempotency key.
pub async fn request_timeout(
    State(limit): State<Duration>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(%method, %path, limit_ms = limit.as_millis() as u64, "request timed out");
            json_error(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                format!("request did not complete within {}ms", limit.as_millis()),
            )
        }
    }
}
