//! Double-entry ledger transaction engine.
//!
//! `LedgerFacade::create_transaction` is the only operation with real
//! invariants: entries sum to exactly zero, share one asset type, reference
//! existing accounts, and are committed together with their header or not at
//! all. A repeated idempotency key replays the first result.
//!
//! Storage is delegated to a `LedgerStore`; this crate ships an in-process
//! implementation for tests/dev, and `flowpay-infra` provides Postgres.

pub mod amount;
pub mod error;
pub mod events;
pub mod facade;
pub mod idempotency;
pub mod model;
pub mod store;
pub mod validator;
pub mod writer;

pub use amount::{Amount, AmountCodec, AmountParseError};
pub use error::{ErrorClass, LedgerError, LedgerResult};
pub use events::TransactionCommitted;
pub use facade::{DEFAULT_TOPIC, LedgerFacade};
pub use idempotency::{IdempotencyGuard, Lookup};
pub use model::{
    Account, CreateTransaction, EntryInput, LedgerEntry, NewAccount, PostedTransaction,
    Transaction, TransactionStatus,
};
pub use store::{InMemoryLedgerStore, LedgerStore, StoreError, UnitOfWork};
pub use validator::AccountValidator;
pub use writer::{TransactionDraft, TransactionWriter};
