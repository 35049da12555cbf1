//! Ledger error taxonomy.

use rust_decimal::Decimal;
use thiserror::Error;

use flowpay_core::{AccountId, DomainError};

use crate::amount::AmountParseError;
use crate::store::StoreError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every way a ledger operation can fail.
///
/// Variants carry the offending entry index (position in the submitted entry
/// list) wherever a single entry is at fault.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed request shape (empty idempotency key, blank owner, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("entry {index}: invalid amount {amount:?}: {reason}")]
    InvalidAmount {
        index: usize,
        amount: String,
        reason: AmountParseError,
    },

    #[error("ledger entries must sum to zero, got {sum}")]
    EntriesUnbalanced { sum: Decimal },

    #[error("a transaction needs at least two entries, got {count}")]
    TooFewEntries { count: usize },

    #[error(
        "entry {index}: account {account_id} holds {found:?}, but this transaction is in {expected:?}"
    )]
    MixedAssets {
        index: usize,
        account_id: AccountId,
        expected: String,
        found: String,
    },

    /// `index` is set when the id came from a transaction entry.
    #[error("account {account_id} not found")]
    AccountNotFound {
        index: Option<usize>,
        account_id: AccountId,
    },

    /// The header insert lost a race on the idempotency key.
    ///
    /// Raised by `TransactionWriter` only. `LedgerFacade` resolves it into a
    /// replay of the winning transaction; callers of the facade never see it.
    #[error("idempotency key {idempotency_key:?} was committed by a concurrent request")]
    DuplicateKeyRace { idempotency_key: String },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// How a caller should treat an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is wrong; retrying it unchanged fails again.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// Store or commit failure. Safe to retry with the same idempotency key.
    Internal,
}

impl LedgerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::InvalidRequest(_)
            | LedgerError::InvalidAmount { .. }
            | LedgerError::EntriesUnbalanced { .. }
            | LedgerError::TooFewEntries { .. }
            | LedgerError::MixedAssets { .. } => ErrorClass::Validation,
            LedgerError::AccountNotFound { .. } => ErrorClass::NotFound,
            LedgerError::DuplicateKeyRace { .. } | LedgerError::Storage(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidRequest(_) => "invalid_request",
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::EntriesUnbalanced { .. } => "entries_unbalanced",
            LedgerError::TooFewEntries { .. } => "too_few_entries",
            LedgerError::MixedAssets { .. } => "mixed_assets",
            LedgerError::AccountNotFound { .. } => "account_not_found",
            LedgerError::DuplicateKeyRace { .. } => "duplicate_key_race",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    /// Index of the entry at fault, if one is.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            LedgerError::InvalidAmount { index, .. } | LedgerError::MixedAssets { index, .. } => {
                Some(*index)
            }
            LedgerError::AccountNotFound { index, .. } => *index,
            _ => None,
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                LedgerError::InvalidRequest(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_the_taxonomy() {
        let missing = LedgerError::AccountNotFound {
            index: Some(1),
            account_id: AccountId::new(),
        };
        assert_eq!(missing.class(), ErrorClass::NotFound);
        assert_eq!(missing.entry_index(), Some(1));

        let unbalanced = LedgerError::EntriesUnbalanced { sum: Decimal::ONE };
        assert_eq!(unbalanced.class(), ErrorClass::Validation);
        assert_eq!(unbalanced.entry_index(), None);

        let storage = LedgerError::from(StoreError::Backend("connection reset".to_string()));
        assert_eq!(storage.class(), ErrorClass::Internal);
        assert_eq!(storage.code(), "storage_error");
    }

    #[test]
    fn domain_errors_become_invalid_requests() {
        let err = LedgerError::from(DomainError::validation("owner must not be empty"));
        assert_eq!(err.code(), "invalid_request");
        assert_eq!(err.to_string(), "invalid request: owner must not be empty");
    }
}
