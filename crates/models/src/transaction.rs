use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Metadata;

const RESERVED: [&str; 5] = ["id", "type", "amount", "timestamp", "balance_after"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Credit => f.write_str("credit"),
            TransactionKind::Debit => f.write_str("debit"),
        }
    }
}

/// Immutable ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub balance_after: u64,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl Transaction {
    pub fn new(kind: TransactionKind, amount: u64, balance_after: u64, mut metadata: Metadata) -> Self {
        for key in RESERVED {
            metadata.remove(key);
        }
        Self { id: Uuid::new_v4(), kind, amount, timestamp: Utc::now(), balance_after, metadata }
    }

    /// Signed effect on the balance.
    pub fn delta(&self) -> i128 {
        match self.kind {
            TransactionKind::Credit => self.amount as i128,
            TransactionKind::Debit => -(self.amount as i128),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let mut m = Metadata::new();
        m.insert("note".into(), json!("top-up"));
        m.insert("amount".into(), json!(999));
        let tx = Transaction::new(TransactionKind::Credit, 50, 50, m);
        let v = serde_json::to_value(&tx).unwrap();
        assert_eq!(v["type"], "credit");
        assert_eq!(v["amount"], 50);
        assert_eq!(v["note"], "top-up");
    }

    #[test]
    fn delta_sign() {
        let c = Transaction::new(TransactionKind::Credit, 10, 10, Metadata::new());
        let d = Transaction::new(TransactionKind::Debit, 4, 6, Metadata::new());
        assert_eq!(c.delta() + d.delta(), 6);
    }

    #[test]
    fn legacy_rows_without_balance_after_parse() {
        let raw = json!({
            "id": Uuid::new_v4(),
            "type": "debit",
            "amount": 3,
            "timestamp": "2026-01-02T03:04:05Z"
        });
        let tx: Transaction = serde_json::from_value(raw).unwrap();
        assert_eq!(tx.kind, TransactionKind::Debit);
        assert_eq!(tx.balance_after, 0);
    }
}
