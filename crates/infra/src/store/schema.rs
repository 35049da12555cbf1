//! Ledger DDL. Every statement is idempotent so bootstrap can run on each
//! start.

pub const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    owner TEXT NOT NULL,
    asset_type TEXT NOT NULL,
    account_type TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY,
    idempotency_key TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL,
    status TEXT NOT NULL,
    metadata JSONB NOT NULL DEFAULT 'null'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub const CREATE_LEDGER_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS ledger_entries (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL REFERENCES transactions (id),
    account_id UUID NOT NULL REFERENCES accounts (id),
    amount NUMERIC NOT NULL
)
"#;

pub const CREATE_ENTRIES_ACCOUNT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_account_id ON ledger_entries (account_id)";

pub const CREATE_ENTRIES_TRANSACTION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_ledger_entries_transaction_id ON ledger_entries (transaction_id)";

/// Bootstrap order (referenced tables first).
pub const STATEMENTS: &[(&str, &str)] = &[
    ("accounts", CREATE_ACCOUNTS),
    ("transactions", CREATE_TRANSACTIONS),
    ("ledger_entries", CREATE_LEDGER_ENTRIES),
    ("idx_ledger_entries_account_id", CREATE_ENTRIES_ACCOUNT_INDEX),
    ("idx_ledger_entries_transaction_id", CREATE_ENTRIES_TRANSACTION_INDEX),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_statement_is_idempotent() {
        for (name, sql) in STATEMENTS {
            assert!(sql.contains("IF NOT EXISTS"), "{name} must be re-runnable");
        }
    }

    #[test]
    fn referenced_tables_are_created_before_entries() {
        let position = |name: &str| STATEMENTS.iter().position(|(n, _)| *n == name).unwrap();
        assert!(position("accounts") < position("ledger_entries"));
        assert!(position("transactions") < position("ledger_entries"));
    }
}
