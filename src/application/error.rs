use thiserror::Error;
use uuid::Uuid;

use crate::domain::Cents;

/// Engine error taxonomy. Every failure carries its specific kind so callers
/// can tell "retry safe" (conflict, store outage) from "do not retry"
/// (insufficient funds, bad request) without parsing messages.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transfer source and destination are the same account")]
    SameAccount,

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error(
        "Insufficient funds in account {account}: balance {balance_cents}, requested {requested_cents}"
    )]
    InsufficientFunds {
        account: Uuid,
        balance_cents: Cents,
        requested_cents: Cents,
    },

    #[error("Transfer aborted after repeated version conflicts")]
    TransferConflict,

    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(#[from] anyhow::Error),
}

impl CoreError {
    /// HTTP-style status for a transport layer to translate mechanically.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::InvalidAmount(_) => 400,
            CoreError::AccountNotFound(_) => 404,
            CoreError::SameAccount
            | CoreError::InsufficientFunds { .. }
            | CoreError::TransferConflict => 409,
            CoreError::StoreUnavailable(_) => 503,
        }
    }

    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransferConflict | CoreError::StoreUnavailable(_)
        )
    }
}
