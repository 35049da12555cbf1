//! Store contract the ledger delegates durability to.
//!
//! The store owns three tables (accounts, transactions, ledger_entries) with a
//! unique idempotency key. Reads outside a unit of work go straight to the
//! store; the writer's reads and inserts go through a `UnitOfWork`, which is
//! the only isolated scope in the system.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use flowpay_core::{AccountId, TransactionId};

use crate::model::{Account, LedgerEntry, Transaction};

pub mod in_memory;

#[cfg(test)]
pub(crate) mod testing;

pub use in_memory::InMemoryLedgerStore;

/// Store operation error.
///
/// `NotFound` and `UniqueViolation` must be reported distinctly from every
/// other failure: the ledger uses them for control flow (idempotency miss,
/// duplicate-key race).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0}")]
    Backend(String),
}

/// Durable ledger storage.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError>;

    async fn account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// Sum of all committed entry amounts for the account (zero when none).
    /// `NotFound` when the account does not exist.
    async fn balance(&self, id: AccountId) -> Result<Decimal, StoreError>;

    async fn transaction_by_idempotency_key(&self, key: &str) -> Result<Transaction, StoreError>;

    /// Entries of one transaction, in insertion order.
    async fn entries_by_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Open an atomic scope.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Cheap liveness probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// An open atomic scope.
///
/// Nothing written through a unit is visible outside it until `commit`
/// succeeds. Dropping a unit without committing discards it, which is how
/// cancellation (a dropped future) rolls back.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// `UniqueViolation` when the idempotency key already exists.
    async fn insert_transaction(&mut self, transaction: Transaction)
    -> Result<Transaction, StoreError>;

    async fn insert_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        (**self).insert_account(account).await
    }

    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        (**self).account(id).await
    }

    async fn balance(&self, id: AccountId) -> Result<Decimal, StoreError> {
        (**self).balance(id).await
    }

    async fn transaction_by_idempotency_key(&self, key: &str) -> Result<Transaction, StoreError> {
        (**self).transaction_by_idempotency_key(key).await
    }

    async fn entries_by_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).entries_by_transaction(id).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}
