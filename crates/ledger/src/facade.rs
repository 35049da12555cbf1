//! Ledger entrypoint: `CreateTransaction`, `CreateAccount`, `GetAccount`,
//! `GetBalance`.
//!
//! ## CreateTransaction flow
//!
//! ```text
//! Start
//!   ↓ shape checks (key, type, ≥ 2 entries)
//!   ↓ parse + sum amounts                  → InvalidAmount | EntriesUnbalanced
//!   ↓ idempotency lookup ── hit ──────────→ replay (done, nothing written)
//!   ↓ unit of work: validate accounts      → AccountNotFound | MixedAssets
//!   ↓               insert header + entries, commit
//!   │                 └─ duplicate key ───→ lookup again → replay winner
//!   ↓ Committed
//!   ↓ publish `ledger.transaction_committed` (best-effort, outside the unit)
//! ```

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use flowpay_core::AccountId;
use flowpay_core::error::require_non_empty;
use flowpay_events::{EventBus, EventEnvelope};

use crate::amount::AmountCodec;
use crate::error::LedgerError;
use crate::events::TransactionCommitted;
use crate::idempotency::{IdempotencyGuard, Lookup};
use crate::model::{Account, CreateTransaction, NewAccount, PostedTransaction};
use crate::store::{LedgerStore, StoreError};
use crate::writer::{TransactionDraft, TransactionWriter};

/// Topic used for commit notifications unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "payments";

/// Orchestrates the ledger components over an injected store and
/// notification bus.
///
/// Holds no per-request state; share one instance (behind an `Arc`) across
/// all request tasks.
#[derive(Debug)]
pub struct LedgerFacade<S, B> {
    store: S,
    bus: B,
    topic: String,
}

impl<S, B> LedgerFacade<S, B>
where
    S: LedgerStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B) -> Self {
        Self {
            store,
            bus,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(skip(self), err)]
    pub async fn create_account(&self, new_account: NewAccount) -> Result<Account, LedgerError> {
        new_account.validate()?;
        let account = self
            .store
            .insert_account(new_account.into_account(chrono::Utc::now()))
            .await?;
        info!(account_id = %account.id, asset_type = %account.asset_type, "account created");
        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %account_id), err)]
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .account(account_id)
            .await
            .map_err(|e| not_found_as_account(e, account_id))
    }

    /// Sum of every committed entry for the account, computed on demand.
    #[instrument(skip(self), fields(account_id = %account_id), err)]
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        self.store
            .balance(account_id)
            .await
            .map_err(|e| not_found_as_account(e, account_id))
    }

    #[instrument(
        skip(self, request),
        fields(
            idempotency_key = %request.idempotency_key,
            kind = %request.kind,
            entry_count = request.entries.len()
        ),
        err
    )]
    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<PostedTransaction, LedgerError> {
        require_non_empty("idempotency_key", &request.idempotency_key)?;
        require_non_empty("type", &request.kind)?;
        if request.entries.len() < 2 {
            return Err(LedgerError::TooFewEntries {
                count: request.entries.len(),
            });
        }

        let amounts = AmountCodec::parse_balanced(request.entries.iter().map(|e| e.amount.as_str()))?;

        let guard = IdempotencyGuard::new(&self.store);
        if let Lookup::Hit(posted) = guard.check(&request.idempotency_key).await? {
            debug!(transaction_id = %posted.transaction.id, "idempotent replay");
            return Ok(posted);
        }

        let draft = TransactionDraft {
            idempotency_key: request.idempotency_key,
            kind: request.kind,
            metadata: request.metadata,
            entries: request
                .entries
                .iter()
                .map(|e| e.account_id)
                .zip(amounts)
                .collect(),
        };

        let posted = match TransactionWriter::new(&self.store).write(draft).await {
            Ok(posted) => posted,
            Err(LedgerError::DuplicateKeyRace { idempotency_key }) => {
                return self.replay_race_winner(&guard, &idempotency_key).await;
            }
            Err(err) => return Err(err),
        };

        info!(transaction_id = %posted.transaction.id, "transaction committed");
        self.notify(&posted);
        Ok(posted)
    }

    /// A concurrent request committed the same key between our lookup and
    /// our insert. Its result is the answer.
    async fn replay_race_winner(
        &self,
        guard: &IdempotencyGuard<'_, S>,
        idempotency_key: &str,
    ) -> Result<PostedTransaction, LedgerError> {
        match guard.check(idempotency_key).await? {
            Lookup::Hit(posted) => {
                debug!(
                    transaction_id = %posted.transaction.id,
                    "lost idempotency race; replaying winner"
                );
                Ok(posted)
            }
            Lookup::Miss => Err(LedgerError::Storage(StoreError::Backend(format!(
                "idempotency key {idempotency_key:?} was rejected as duplicate but no transaction holds it"
            )))),
        }
    }

    /// Post-commit notification. Never fails the request: the transaction is
    /// already durable, so a lost event is logged and not retried.
    fn notify(&self, posted: &PostedTransaction) {
        let event = TransactionCommitted::from(posted);
        let key = posted.transaction.idempotency_key.as_str();
        let envelope = match EventEnvelope::from_event(self.topic.as_str(), key, &event) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    transaction_id = %posted.transaction.id,
                    error = %err,
                    "failed to encode commit notification"
                );
                return;
            }
        };

        if let Err(err) = self.bus.publish(envelope) {
            warn!(
                transaction_id = %posted.transaction.id,
                topic = %self.topic,
                error = ?err,
                "failed to publish commit notification"
            );
        }
    }
}

fn not_found_as_account(err: StoreError, account_id: AccountId) -> LedgerError {
    match err {
        StoreError::NotFound => LedgerError::AccountNotFound {
            index: None,
            account_id,
        },
        other => LedgerError::Storage(other),
    }
}
