//! The atomic commit unit.

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, warn};

use flowpay_core::{AccountId, EntryId, TransactionId};

use crate::amount::Amount;
use crate::error::LedgerError;
use crate::model::{LedgerEntry, PostedTransaction, Transaction, TransactionStatus};
use crate::store::{LedgerStore, StoreError, UnitOfWork};
use crate::validator::AccountValidator;

/// A balanced transaction that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub idempotency_key: String,
    pub kind: String,
    pub metadata: JsonValue,
    /// Parsed entries, in submission order.
    pub entries: Vec<(AccountId, Amount)>,
}

/// Persists a transaction header and all of its entries, or nothing.
///
/// One unit of work spans:
/// 1. account validation (existence + single asset type)
/// 2. header insert
/// 3. entry inserts, in submission order
/// 4. commit
///
/// Any failure discards the unit. If the caller drops the returned future
/// mid-flight the unit is dropped too, which rolls it back.
///
/// A unique violation on the header insert means another request committed
/// the same idempotency key first; that is reported as
/// `LedgerError::DuplicateKeyRace` for the caller to resolve.
#[derive(Debug)]
pub struct TransactionWriter<'a, S: ?Sized> {
    store: &'a S,
    validator: AccountValidator,
}

impl<'a, S> TransactionWriter<'a, S>
where
    S: LedgerStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            validator: AccountValidator::new(),
        }
    }

    #[instrument(
        skip(self, draft),
        fields(
            idempotency_key = %draft.idempotency_key,
            entry_count = draft.entries.len()
        ),
        err
    )]
    pub async fn write(&self, draft: TransactionDraft) -> Result<PostedTransaction, LedgerError> {
        let mut uow = self.store.begin().await?;

        let staged = self.stage(uow.as_mut(), draft).await;
        let posted = match staged {
            Ok(posted) => posted,
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "rollback failed; unit discarded on drop");
                }
                return Err(err);
            }
        };

        uow.commit().await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => LedgerError::DuplicateKeyRace {
                idempotency_key: posted.transaction.idempotency_key.clone(),
            },
            other => LedgerError::Storage(other),
        })?;

        debug!(transaction_id = %posted.transaction.id, "transaction committed");
        Ok(posted)
    }

    async fn stage(
        &self,
        uow: &mut dyn UnitOfWork,
        draft: TransactionDraft,
    ) -> Result<PostedTransaction, LedgerError> {
        let account_ids: Vec<AccountId> = draft.entries.iter().map(|(id, _)| *id).collect();
        self.validator.validate(uow, &account_ids).await?;

        let header = Transaction {
            id: TransactionId::new(),
            idempotency_key: draft.idempotency_key,
            kind: draft.kind,
            status: TransactionStatus::Completed,
            metadata: draft.metadata,
            created_at: Utc::now(),
        };

        let idempotency_key = header.idempotency_key.clone();
        let transaction = uow.insert_transaction(header).await.map_err(|e| match e {
            StoreError::UniqueViolation(_) => LedgerError::DuplicateKeyRace { idempotency_key },
            other => LedgerError::Storage(other),
        })?;

        let mut entries = Vec::with_capacity(draft.entries.len());
        for (account_id, amount) in draft.entries {
            let entry = LedgerEntry {
                id: EntryId::new(),
                transaction_id: transaction.id,
                account_id,
                amount: amount.value(),
            };
            entries.push(uow.insert_entry(entry).await?);
        }

        Ok(PostedTransaction {
            transaction,
            entries,
        })
    }
}
