//! Transport-agnostic request/response shapes.
//!
//! An HTTP (or any other) front translates these mechanically: serialize the
//! request from the wire, call the matching service, serialize the response
//! back. Status codes follow HTTP conventions so the mapping stays trivial.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, Cents, TransactionRecord, TransactionStatus, TransactionType,
};

use super::CoreError;

/// `POST /api/accounts`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub account_type: AccountType,
    #[serde(default)]
    pub initial_balance: Cents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    /// Masked for display; the full number never leaves the engine.
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Cents,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            account_number: account.masked_number(),
            account_type: account.account_type,
            balance: account.balance_cents,
            created_at: account.created_at,
        }
    }
}

/// `POST /api/transfer`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount: Cents,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub client_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub status: u16,
    pub transaction_id: Option<Uuid>,
    pub message: String,
}

impl TransferResponse {
    pub fn completed(record: &TransactionRecord) -> Self {
        Self {
            status: 200,
            transaction_id: Some(record.id),
            message: "Transfer completed".to_string(),
        }
    }

    pub fn failed(err: &CoreError) -> Self {
        Self {
            status: err.status_code(),
            transaction_id: None,
            message: err.to_string(),
        }
    }
}

/// `GET /api/transactions/{accountId}` items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub from_account: Option<Uuid>,
    pub to_account: Option<Uuid>,
    pub amount: Cents,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for TransactionResponse {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            id: record.id,
            from_account: record.from_account,
            to_account: record.to_account,
            amount: record.amount_cents,
            transaction_type: record.transaction_type,
            status: record.status,
            description: record.description.clone(),
            created_at: record.created_at,
        }
    }
}
