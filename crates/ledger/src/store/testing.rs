//! Fault-injecting store wrapper for atomicity tests.

use async_trait::async_trait;
use rust_decimal::Decimal;

use flowpay_core::{AccountId, TransactionId};

use super::{InMemoryLedgerStore, LedgerStore, StoreError, UnitOfWork};
use crate::model::{Account, LedgerEntry, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Fail the entry insert after `after` entries went through.
    FailEntryInsert { after: usize },
    /// Never complete the entry insert after `after` entries went through.
    HangOnEntryInsert { after: usize },
    FailCommit,
    FailLookup,
}

#[derive(Debug, Clone)]
pub(crate) struct FaultyStore {
    pub(crate) inner: InMemoryLedgerStore,
    fault: Fault,
}

impl FaultyStore {
    pub(crate) fn new(inner: InMemoryLedgerStore, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        self.inner.insert_account(account).await
    }

    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.inner.account(id).await
    }

    async fn balance(&self, id: AccountId) -> Result<Decimal, StoreError> {
        self.inner.balance(id).await
    }

    async fn transaction_by_idempotency_key(&self, key: &str) -> Result<Transaction, StoreError> {
        if self.fault == Fault::FailLookup {
            return Err(StoreError::Backend("connection reset by peer".to_string()));
        }
        self.inner.transaction_by_idempotency_key(key).await
    }

    async fn entries_by_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.entries_by_transaction(id).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            fault: self.fault,
            entries_inserted: 0,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

struct FaultyUnitOfWork {
    inner: Box<dyn UnitOfWork>,
    fault: Fault,
    entries_inserted: usize,
}

#[async_trait]
impl UnitOfWork for FaultyUnitOfWork {
    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.inner.account(id).await
    }

    async fn insert_transaction(
        &mut self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        self.inner.insert_transaction(transaction).await
    }

    async fn insert_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        match self.fault {
            Fault::FailEntryInsert { after } if self.entries_inserted >= after => {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            Fault::HangOnEntryInsert { after } if self.entries_inserted >= after => {
                std::future::pending::<()>().await;
            }
            _ => {}
        }
        let stored = self.inner.insert_entry(entry).await?;
        self.entries_inserted += 1;
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fault == Fault::FailCommit {
            return Err(StoreError::Backend("commit failed: serialization failure".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}
