//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | Idempotency key already committed by another request |
//! | Database (foreign key violation) | `23503` | `Backend` | Entry references a missing account/transaction |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | RowNotFound | N/A | `NotFound` | `fetch_one` found nothing |
//! | PoolClosed / Io / Tls / other | N/A | `Backend` | Connection failures, shutdown |
//!
//! ## Atomicity
//!
//! A unit of work wraps one `sqlx::Transaction`. Dropping it without
//! committing returns the connection to the pool with a rollback queued, so a
//! cancelled request never leaves a partial transaction behind.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row};
use tracing::{info, instrument};

use flowpay_core::{AccountId, EntryId, TransactionId};
use flowpay_ledger::{
    Account, LedgerEntry, LedgerStore, StoreError, Transaction, TransactionStatus, UnitOfWork,
};

use super::schema;

const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Pool gauges reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

/// Ledger tables in Postgres.
///
/// `Clone` is cheap: the pool is reference counted.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
        }
    }

    /// Create the ledger tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for (name, statement) in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(&format!("ensure_schema({name})"), e))?;
        }
        info!("ledger schema ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, account), fields(account_id = %account.id), err)]
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (id, owner, asset_type, account_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, owner, asset_type, account_type, created_at
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.owner)
        .bind(&account.asset_type)
        .bind(&account.account_type)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        decode::<AccountRow>(&row).map(Into::into)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn account(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, asset_type, account_type, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("account", e))?
        .ok_or(StoreError::NotFound)?;

        decode::<AccountRow>(&row).map(Into::into)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn balance(&self, id: AccountId) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(
                (SELECT SUM(e.amount) FROM ledger_entries e WHERE e.account_id = a.id),
                0
            ) AS balance
            FROM accounts a
            WHERE a.id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("balance", e))?
        .ok_or(StoreError::NotFound)?;

        row.try_get::<Decimal, _>("balance")
            .map_err(|e| StoreError::Backend(format!("failed to decode balance: {e}")))
    }

    #[instrument(skip(self), err)]
    async fn transaction_by_idempotency_key(&self, key: &str) -> Result<Transaction, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, idempotency_key, type, status, metadata, created_at
            FROM transactions
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("transaction_by_idempotency_key", e))?
        .ok_or(StoreError::NotFound)?;

        decode::<TransactionRow>(&row)?.try_into()
    }

    #[instrument(skip(self), fields(transaction_id = %id), err)]
    async fn entries_by_transaction(
        &self,
        id: TransactionId,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        // Entry ids are UUIDv7, so id order is insertion order.
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, account_id, amount
            FROM ledger_entries
            WHERE transaction_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_by_transaction", e))?;

        rows.iter()
            .map(|row| decode::<EntryRow>(row).map(Into::into))
            .collect()
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let probe = sqlx::query("SELECT 1").execute(&self.pool);
        match tokio::time::timeout(PING_TIMEOUT, probe).await {
            Ok(result) => result.map(|_| ()).map_err(|e| map_sqlx_error("ping", e)),
            Err(_) => Err(StoreError::Backend(format!(
                "database did not answer within {}ms",
                PING_TIMEOUT.as_millis()
            ))),
        }
    }
}

/// One open Postgres transaction.
struct PgUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, asset_type, account_type, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("uow.account", e))?
        .ok_or(StoreError::NotFound)?;

        decode::<AccountRow>(&row).map(Into::into)
    }

    async fn insert_transaction(
        &mut self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        // RETURNING hands back the stored values (timestamps at column
        // precision), so a fresh commit and a later replay serialize alike.
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (id, idempotency_key, type, status, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, idempotency_key, type, status, metadata, created_at
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(&transaction.idempotency_key)
        .bind(&transaction.kind)
        .bind(transaction.status.as_str())
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("uow.insert_transaction", e))?;

        decode::<TransactionRow>(&row)?.try_into()
    }

    async fn insert_entry(&mut self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, transaction_id, account_id, amount)
            VALUES ($1, $2, $3, $4)
            RETURNING id, transaction_id, account_id, amount
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.transaction_id.as_uuid())
        .bind(entry.account_id.as_uuid())
        .bind(entry.amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("uow.insert_entry", e))?;

        decode::<EntryRow>(&row).map(Into::into)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to store errors with operation context.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::UniqueViolation(format!("{operation}: {err}"));
    }
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => StoreError::Backend(format!(
            "database error in {operation}: {}",
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

fn decode<'r, T>(row: &'r PgRow) -> Result<T, StoreError>
where
    T: FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: uuid::Uuid,
    owner: String,
    asset_type: String,
    account_type: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            owner: row.try_get("owner")?,
            asset_type: row.try_get("asset_type")?,
            account_type: row.try_get("account_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.id),
            owner: row.owner,
            asset_type: row.asset_type,
            account_type: row.account_type,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: uuid::Uuid,
    idempotency_key: String,
    kind: String,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TransactionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            idempotency_key: row.try_get("idempotency_key")?,
            kind: row.try_get("type")?,
            status: row.try_get("status")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = TransactionStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Backend(format!(
                "transaction {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(Transaction {
            id: TransactionId::from_uuid(row.id),
            idempotency_key: row.idempotency_key,
            kind: row.kind,
            status,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    id: uuid::Uuid,
    transaction_id: uuid::Uuid,
    account_id: uuid::Uuid,
    amount: Decimal,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            transaction_id: row.try_get("transaction_id")?,
            account_id: row.try_get("account_id")?,
            amount: row.try_get("amount")?,
        })
    }
}

impl From<EntryRow> for LedgerEntry {
    fn from(row: EntryRow) -> Self {
        LedgerEntry {
            id: EntryId::from_uuid(row.id),
            transaction_id: TransactionId::from_uuid(row.transaction_id),
            account_id: AccountId::from_uuid(row.account_id),
            amount: row.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert_eq!(
            map_sqlx_error("account", sqlx::Error::RowNotFound),
            StoreError::NotFound
        );
    }

    #[test]
    fn pool_closed_is_a_backend_failure() {
        let err = map_sqlx_error("insert_entry", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Backend(ref msg) if msg.contains("insert_entry")));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }

    #[test]
    fn unknown_status_is_rejected_on_read() {
        let row = TransactionRow {
            id: uuid::Uuid::now_v7(),
            idempotency_key: "k".to_string(),
            kind: "transfer".to_string(),
            status: "pending".to_string(),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        let err = Transaction::try_from(row).unwrap_err();
        assert!(matches!(err, StoreError::Backend(ref msg) if msg.contains("pending")));
    }
}
