use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use flowpay_core::AccountId;
use flowpay_ledger::{CreateTransaction, EntryInput, LedgerError, NewAccount};

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub asset_type: String,
    pub account_type: String,
}

impl From<CreateAccountRequest> for NewAccount {
    fn from(req: CreateAccountRequest) -> Self {
        NewAccount::new(req.owner, req.asset_type, req.account_type)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub entries: Vec<EntryRequest>,
    /// When omitted, the request's type and entries are recorded instead.
    #[serde(default)]
    pub metadata: JsonValue,
}

/// Amounts stay decimal strings on the wire; the ledger parses them.
#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub account_id: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account_id: AccountId,
    pub balance: Decimal,
}

pub fn parse_account_id(raw: &str) -> Result<AccountId, LedgerError> {
    raw.trim().parse::<AccountId>().map_err(LedgerError::from)
}

pub fn to_create_transaction(
    idempotency_key: String,
    body: CreateTransactionRequest,
) -> Result<CreateTransaction, LedgerError> {
    let metadata = if body.metadata.is_null() {
        json!({
            "type": body.kind,
            "entries": body
                .entries
                .iter()
                .map(|e| json!({ "account_id": e.account_id, "amount": e.amount }))
                .collect::<Vec<_>>(),
        })
    } else {
        body.metadata
    };

    let entries = body
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let account_id = parse_account_id(&entry.account_id).map_err(|e| {
                LedgerError::InvalidRequest(format!("entries[{index}].account_id: {e}"))
            })?;
            Ok(EntryInput::new(account_id, entry.amount))
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;

    Ok(CreateTransaction::new(idempotency_key, body.kind, entries).with_metadata(metadata))
}
