//! Durable `LedgerStore` implementations.

pub mod postgres;
pub mod schema;

pub use postgres::{PoolStats, PostgresLedgerStore};
