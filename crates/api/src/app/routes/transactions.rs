use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::dto::{self, CreateTransactionRequest};
use crate::app::errors;
use crate::app::services::AppServices;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn router() -> Router {
    Router::new().route("/", post(create_transaction))
}

/// Replays answer with the same status and body as the first commit.
pub async fn create_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let idempotency_key = match idempotency_key(&headers) {
        Some(k) => k,
        None => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "Idempotency-Key header is required",
            );
        }
    };

    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let request = match dto::to_create_transaction(idempotency_key, body) {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services.create_transaction(request).await {
        Ok(posted) => (StatusCode::CREATED, Json(posted)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(IDEMPOTENCY_KEY_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_or_missing_key_is_rejected() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("   "));
        assert_eq!(idempotency_key(&headers), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" pay-42 "));
        assert_eq!(idempotency_key(&headers).as_deref(), Some("pay-42"));
    }
}
