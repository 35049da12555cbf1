//! Account existence and asset-type checks.

use flowpay_core::AccountId;

use crate::error::LedgerError;
use crate::store::{StoreError, UnitOfWork};

/// Resolves the accounts referenced by pending entries.
///
/// Runs inside the writer's unit of work so the checks and the inserts see
/// the same snapshot. Accounts are checked in entry order and the first
/// violation is reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountValidator;

impl AccountValidator {
    pub fn new() -> Self {
        Self
    }

    /// Returns the shared asset type of all referenced accounts.
    pub async fn validate(
        &self,
        uow: &mut dyn UnitOfWork,
        account_ids: &[AccountId],
    ) -> Result<String, LedgerError> {
        let mut reference: Option<String> = None;

        for (index, account_id) in account_ids.iter().copied().enumerate() {
            let account = match uow.account(account_id).await {
                Ok(account) => account,
                Err(StoreError::NotFound) => {
                    return Err(LedgerError::AccountNotFound {
                        index: Some(index),
                        account_id,
                    });
                }
                Err(e) => return Err(LedgerError::Storage(e)),
            };

            match &reference {
                None => reference = Some(account.asset_type),
                Some(expected) if *expected != account.asset_type => {
                    return Err(LedgerError::MixedAssets {
                        index,
                        account_id,
                        expected: expected.clone(),
                        found: account.asset_type,
                    });
                }
                Some(_) => {}
            }
        }

        reference.ok_or_else(|| LedgerError::TooFewEntries { count: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::model::{Account, NewAccount};
    use crate::store::{InMemoryLedgerStore, LedgerStore};

    async fn open(store: &InMemoryLedgerStore, asset: &str) -> Account {
        store
            .insert_account(NewAccount::new("owner", asset, "asset").into_account(Utc::now()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_asset_accounts_pass() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "USD").await;
        let b = open(&store, "USD").await;

        let mut uow = store.begin().await.unwrap();
        let asset = AccountValidator::new()
            .validate(uow.as_mut(), &[a.id, b.id])
            .await
            .unwrap();
        assert_eq!(asset, "USD");
    }

    #[tokio::test]
    async fn missing_account_reports_its_entry() {
        let store = InMemoryLedgerStore::new();
        let a = open(&store, "USD").await;
        let ghost = AccountId::new();

        let mut uow = store.begin().await.unwrap();
        let err = AccountValidator::new()
            .validate(uow.as_mut(), &[a.id, ghost])
            .await
            .unwrap_err();
        match err {
            LedgerError::AccountNotFound { index, account_id } => {
                assert_eq!(index, Some(1));
                assert_eq!(account_id, ghost);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_account_sets_the_reference_asset() {
        let store = InMemoryLedgerStore::new();
        let usd = open(&store, "USD").await;
        let usd2 = open(&store, "USD").await;
        let eur = open(&store, "EUR").await;

        let mut uow = store.begin().await.unwrap();
        let err = AccountValidator::new()
            .validate(uow.as_mut(), &[usd.id, usd2.id, eur.id])
            .await
            .unwrap_err();
        match err {
            LedgerError::MixedAssets { index, account_id, expected, found } => {
                assert_eq!(index, 2);
                assert_eq!(account_id, eur.id);
                assert_eq!(expected, "USD");
                assert_eq!(found, "EUR");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_violation_wins() {
        let store = InMemoryLedgerStore::new();
        let usd = open(&store, "USD").await;
        let eur = open(&store, "EUR").await;

        let mut uow = store.begin().await.unwrap();
        let err = AccountValidator::new()
            .validate(uow.as_mut(), &[usd.id, eur.id, AccountId::new()])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MixedAssets { index: 1, .. }));
    }
}
