//! Infrastructure layer: Postgres store, notification transports, config,
//! background workers.

pub mod config;
pub mod event_bus;
pub mod store;
pub mod workers;
