use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use flowpay_core::{AccountId, TransactionId};

use super::{LedgerStore, StoreError, UnitOfWork};
use crate::model::{Account, LedgerEntry, Transaction};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    /// Unique index on `transactions.idempotency_key`.
    by_idempotency_key: HashMap<String, TransactionId>,
    /// Append-only, in commit order.
    entries: Vec<LedgerEntry>,
}

impl Tables {
    fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }
}

/// In-process ledger store.
///
/// Intended for tests/dev. A unit of work holds the table lock until it
/// commits or is dropped, so units are fully serialized (the strictest
/// isolation a relational store could offer). Cloning shares the tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed transaction rows.
    pub async fn transaction_count(&self) -> usize {
        self.tables.lock().await.transactions.len()
    }

    /// Number of committed entry rows.
    pub async fn entry_count(&self) -> usize {
        self.tables.lock().await.entries.len()
    }

    /// All committed entries referencing an account.
    pub async fn entries_for_account(&self, id: AccountId) -> Vec<LedgerEntry> {
        self.tables
            .lock()
            .await
            .entries
            .iter()
            .filter(|e| e.account_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::UniqueViolation(format!("accounts.id {}", account.id)));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        self.tables.lock().await.account(id)
    }

    async fn balance(&self, id: AccountId) -> Result<Decimal, StoreError> {
        let tables = self.tables.lock().await;
        tables.account(id)?;

        let mut sum = Decimal::ZERO;
        for entry in tables.entries.iter().filter(|e| e.account_id == id) {
            sum = sum
                .checked_add(entry.amount)
                .ok_or_else(|| StoreError::Backend(format!("balance overflow for account {id}")))?;
        }
        Ok(sum)
    }

    async fn transaction_by_idempotency_key(&self, key: &str) -> Result<Transaction, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .by_idempotency_key
            .get(key)
            .and_then(|id| tables.transactions.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn entries_by_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.transaction_id == id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(InMemoryUnitOfWork {
            tables: guard,
            staged_transactions: Vec::new(),
            staged_entries: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Staged writes over a locked view of the tables.
struct InMemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    staged_transactions: Vec<Transaction>,
    staged_entries: Vec<LedgerEntry>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.tables.account(id)
    }

    async fn insert_transaction(
        &mut self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        let key = &transaction.idempotency_key;
        let taken = self.tables.by_idempotency_key.contains_key(key)
            || self
                .staged_transactions
                .iter()
                .any(|t| &t.idempotency_key == key);
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "transactions.idempotency_key {key:?}"
            )));
        }

        self.staged_transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn insert_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let has_transaction = self.tables.transactions.contains_key(&entry.transaction_id)
            || self
                .staged_transactions
                .iter()
                .any(|t| t.id == entry.transaction_id);
        if !has_transaction {
            return Err(StoreError::Backend(format!(
                "foreign key violation: transaction {} does not exist",
                entry.transaction_id
            )));
        }
        if !self.tables.accounts.contains_key(&entry.account_id) {
            return Err(StoreError::Backend(format!(
                "foreign key violation: account {} does not exist",
                entry.account_id
            )));
        }

        self.staged_entries.push(entry.clone());
        Ok(entry)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork {
            mut tables,
            staged_transactions,
            staged_entries,
        } = *self;

        for transaction in staged_transactions {
            tables
                .by_idempotency_key
                .insert(transaction.idempotency_key.clone(), transaction.id);
            tables.transactions.insert(transaction.id, transaction);
        }
        tables.entries.extend(staged_entries);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flowpay_core::EntryId;

    use crate::model::{NewAccount, TransactionStatus};

    fn account(asset: &str) -> Account {
        NewAccount::new("alice", asset, "asset").into_account(Utc::now())
    }

    fn header(key: &str) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            idempotency_key: key.to_string(),
            kind: "transfer".to_string(),
            status: TransactionStatus::Completed,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    fn entry(transaction_id: TransactionId, account_id: AccountId, amount: i64) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::new(),
            transaction_id,
            account_id,
            amount: Decimal::new(amount, 2),
        }
    }

    #[tokio::test]
    async fn unit_of_work_is_invisible_until_commit() {
        let store = InMemoryLedgerStore::new();
        let a = store.insert_account(account("USD")).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let txn = uow.insert_transaction(header("k1")).await.unwrap();
        uow.insert_entry(entry(txn.id, a.id, 100)).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.transaction_count().await, 1);
        assert_eq!(store.balance(a.id).await.unwrap(), Decimal::new(100, 2));
    }

    #[tokio::test]
    async fn dropped_unit_of_work_leaves_nothing_behind() {
        let store = InMemoryLedgerStore::new();
        let a = store.insert_account(account("USD")).await.unwrap();

        {
            let mut uow = store.begin().await.unwrap();
            let txn = uow.insert_transaction(header("k1")).await.unwrap();
            uow.insert_entry(entry(txn.id, a.id, 100)).await.unwrap();
        }

        assert_eq!(store.transaction_count().await, 0);
        assert_eq!(store.entry_count().await, 0);
        assert!(matches!(
            store.transaction_by_idempotency_key("k1").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_a_unique_violation() {
        let store = InMemoryLedgerStore::new();

        let mut uow = store.begin().await.unwrap();
        uow.insert_transaction(header("k1")).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let err = uow.insert_transaction(header("k1")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn entry_for_unknown_account_is_rejected() {
        let store = InMemoryLedgerStore::new();

        let mut uow = store.begin().await.unwrap();
        let txn = uow.insert_transaction(header("k1")).await.unwrap();
        let err = uow
            .insert_entry(entry(txn.id, AccountId::new(), 100))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn balance_of_unknown_account_is_not_found() {
        let store = InMemoryLedgerStore::new();
        assert_eq!(store.balance(AccountId::new()).await, Err(StoreError::NotFound));
    }
}
