//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger wiring (store + notification sink) picked at startup
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use flowpay_infra::config::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// HTTP-facing settings taken from `AppConfig`.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub cors_allowed_origin: String,
}

impl From<&AppConfig> for HttpSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            cors_allowed_origin: config.cors_allowed_origin.clone(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        (&AppConfig::default()).into()
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>, settings: HttpSettings) -> Router {
    routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            settings.request_timeout,
            middleware::request_timeout,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&settings.cors_allowed_origin)),
        )
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = if allowed_origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        match HeaderValue::from_str(allowed_origin.trim()) {
            Ok(v) => AllowOrigin::exact(v),
            Err(e) => {
                tracing::warn!(allowed_origin, error = %e, "invalid CORS origin; cross-origin requests disabled");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(routes::transactions::IDEMPOTENCY_KEY_HEADER),
        ])
}
