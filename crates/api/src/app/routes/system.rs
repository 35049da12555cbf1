use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;

/// Liveness of the ledger store; 503 while it cannot be reached.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let report = services.health().await;
    let status = if report.up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report.body)).into_response()
}
