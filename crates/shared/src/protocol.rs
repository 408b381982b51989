use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Category, TransactionId, TransactionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub title: String,
    pub value: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: Category,
    #[serde(alias = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn signed_value(&self) -> Decimal {
        self.kind.signed(self.value)
    }
}

/// Aggregate computed by the service over the full transaction set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub income: Decimal,
    pub outcome: Decimal,
    pub total: Decimal,
}

/// Payload of `GET /transactions`. Both fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub transactions: Vec<Transaction>,
    pub balance: Balance,
}
