use axum::{routing::get, Router};

pub mod accounts;
pub mod system;
pub mod transactions;

/// Router for all ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/accounts", accounts::router())
        .nest("/transactions", transactions::router())
}
