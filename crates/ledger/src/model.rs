//! Ledger records and request types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use flowpay_core::error::require_non_empty;
use flowpay_core::{AccountId, DomainResult, Entity, EntryId, TransactionId};

/// A ledger account. Never mutated after creation; its balance is derived
/// from the entries that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Currency/unit code (e.g. "USD").
    pub asset_type: String,
    /// e.g. "asset", "liability".
    pub account_type: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Input for `CreateAccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub asset_type: String,
    pub account_type: String,
}

impl NewAccount {
    pub fn new(
        owner: impl Into<String>,
        asset_type: impl Into<String>,
        account_type: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            asset_type: asset_type.into(),
            account_type: account_type.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_non_empty("owner", &self.owner)?;
        require_non_empty("asset_type", &self.asset_type)?;
        require_non_empty("account_type", &self.account_type)
    }

    /// Materialize the account row with a fresh id.
    pub fn into_account(self, created_at: DateTime<Utc>) -> Account {
        Account {
            id: AccountId::new(),
            owner: self.owner,
            asset_type: self.asset_type,
            account_type: self.account_type,
            created_at,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(TransactionStatus::Completed),
            _ => None,
        }
    }
}

/// Transaction header. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TransactionStatus,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl Entity for Transaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One signed movement against one account, owned by one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub amount: Decimal,
}

impl Entity for LedgerEntry {
    type Id = EntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One requested entry: the amount is still the caller's decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    pub account_id: AccountId,
    pub amount: String,
}

impl EntryInput {
    pub fn new(account_id: AccountId, amount: impl Into<String>) -> Self {
        Self {
            account_id,
            amount: amount.into(),
        }
    }
}

/// Input for `CreateTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub metadata: JsonValue,
    pub entries: Vec<EntryInput>,
}

impl CreateTransaction {
    pub fn new(
        idempotency_key: impl Into<String>,
        kind: impl Into<String>,
        entries: Vec<EntryInput>,
    ) -> Self {
        Self {
            idempotency_key: idempotency_key.into(),
            kind: kind.into(),
            metadata: JsonValue::Null,
            entries,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A committed transaction with its entries, in submission order.
///
/// Returned identically for a fresh commit and for an idempotent replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedTransaction {
    pub transaction: Transaction,
    pub entries: Vec<LedgerEntry>,
}
