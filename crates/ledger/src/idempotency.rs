//! Idempotency-key lookup.

use tracing::instrument;

use crate::error::LedgerError;
use crate::model::PostedTransaction;
use crate::store::{LedgerStore, StoreError};

/// Outcome of an idempotency lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A transaction with this key is already committed.
    Hit(PostedTransaction),
    /// No transaction with this key exists yet.
    Miss,
}

/// Looks up a prior transaction by its client-supplied key.
///
/// Read-only: a hit never writes anything. Only `StoreError::NotFound` means
/// "miss"; every other failure is surfaced so a broken store is never
/// mistaken for a fresh key.
#[derive(Debug)]
pub struct IdempotencyGuard<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> IdempotencyGuard<'a, S>
where
    S: LedgerStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    #[instrument(skip(self), err)]
    pub async fn check(&self, idempotency_key: &str) -> Result<Lookup, LedgerError> {
        let transaction = match self
            .store
            .transaction_by_idempotency_key(idempotency_key)
            .await
        {
            Ok(transaction) => transaction,
            Err(StoreError::NotFound) => return Ok(Lookup::Miss),
            Err(e) => return Err(LedgerError::Storage(e)),
        };

        let entries = self.store.entries_by_transaction(transaction.id).await?;
        Ok(Lookup::Hit(PostedTransaction {
            transaction,
            entries,
        }))
    }
}
