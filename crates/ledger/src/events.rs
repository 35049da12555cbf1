//! Events published after a ledger commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flowpay_core::TransactionId;
use flowpay_events::Event;

use crate::model::{LedgerEntry, PostedTransaction, TransactionStatus};

/// Event: a transaction and its entries are durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCommitted {
    pub transaction_id: TransactionId,
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: TransactionStatus,
    pub entries: Vec<LedgerEntry>,
    pub occurred_at: DateTime<Utc>,
}

impl From<&PostedTransaction> for TransactionCommitted {
    fn from(posted: &PostedTransaction) -> Self {
        Self {
            transaction_id: posted.transaction.id,
            idempotency_key: posted.transaction.idempotency_key.clone(),
            kind: posted.transaction.kind.clone(),
            status: posted.transaction.status,
            entries: posted.entries.clone(),
            occurred_at: posted.transaction.created_at,
        }
    }
}

impl Event for TransactionCommitted {
    fn event_type(&self) -> &'static str {
        "ledger.transaction_committed"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
