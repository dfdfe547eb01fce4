use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Moves funds between two accounts
    Transfer,
    /// Credits a single account (no source slot)
    Deposit,
    /// Debits a single account (no destination slot)
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Transfer => "transfer",
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "transfer" => Some(TransactionType::Transfer),
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a transaction record. Created `Pending`, transitions exactly
/// once to `Completed` or `Failed`, then never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of one funds movement. The ledger is append-only:
/// records reach a terminal status and are never mutated or deleted after.
///
/// Records are direction-neutral; display sign (debit vs credit) is derived
/// by the reader comparing `from_account` with the account being viewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Store-assigned monotonic sequence, makes records totally orderable
    pub seq: i64,
    /// Source account; None for deposits
    pub from_account: Option<AccountId>,
    /// Destination account; None for withdrawals
    pub to_account: Option<AccountId>,
    /// Amount in cents, always positive
    pub amount_cents: Cents,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub description: Option<String>,
    /// Caller-supplied idempotency anchor; a resubmitted request carrying the
    /// same ref is answered with the original record instead of re-applied
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn new(
        transaction_type: TransactionType,
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount_cents: Cents,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            seq: 0, // assigned by the store on append
            from_account,
            to_account,
            amount_cents,
            transaction_type,
            status: TransactionStatus::Pending,
            description: None,
            client_ref: None,
            created_at: Utc::now(),
        }
    }

    pub fn transfer(from: AccountId, to: AccountId, amount_cents: Cents) -> Self {
        Self::new(TransactionType::Transfer, Some(from), Some(to), amount_cents)
    }

    pub fn deposit(to: AccountId, amount_cents: Cents) -> Self {
        Self::new(TransactionType::Deposit, None, Some(to), amount_cents)
    }

    pub fn withdrawal(from: AccountId, amount_cents: Cents) -> Self {
        Self::new(TransactionType::Withdrawal, Some(from), None, amount_cents)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_client_ref(mut self, client_ref: impl Into<String>) -> Self {
        self.client_ref = Some(client_ref.into());
        self
    }

    /// Whether this record touches the given account on either side.
    pub fn involves(&self, account: AccountId) -> bool {
        self.from_account == Some(account) || self.to_account == Some(account)
    }

    /// Balance effect of this record on the given account, if committed.
    /// Positive for credits, negative for debits, None if unrelated.
    pub fn effect_on(&self, account: AccountId) -> Option<Cents> {
        if self.to_account == Some(account) {
            Some(self.amount_cents)
        } else if self.from_account == Some(account) {
            Some(-self.amount_cents)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_record_references_both_accounts() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let record = TransactionRecord::transfer(a, b, 30000)
            .with_description("rent")
            .with_client_ref("req-1");

        assert_eq!(record.transaction_type, TransactionType::Transfer);
        assert_eq!(record.status, TransactionStatus::Pending);
        assert_eq!(record.from_account, Some(a));
        assert_eq!(record.to_account, Some(b));
        assert_eq!(record.description.as_deref(), Some("rent"));
        assert_eq!(record.client_ref.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_deposit_has_no_source_slot() {
        let account = Uuid::new_v4();
        let record = TransactionRecord::deposit(account, 1000);
        assert_eq!(record.from_account, None);
        assert_eq!(record.to_account, Some(account));
    }

    #[test]
    fn test_withdrawal_has_no_destination_slot() {
        let account = Uuid::new_v4();
        let record = TransactionRecord::withdrawal(account, 1000);
        assert_eq!(record.from_account, Some(account));
        assert_eq!(record.to_account, None);
    }

    #[test]
    fn test_effect_on_is_direction_neutral_storage() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let record = TransactionRecord::transfer(a, b, 500);

        assert_eq!(record.effect_on(a), Some(-500));
        assert_eq!(record.effect_on(b), Some(500));
        assert_eq!(record.effect_on(Uuid::new_v4()), None);
        assert!(record.involves(a));
        assert!(record.involves(b));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }

    #[test]
    #[should_panic(expected = "Transaction amount must be positive")]
    fn test_record_requires_positive_amount() {
        TransactionRecord::transfer(Uuid::new_v4(), Uuid::new_v4(), 0);
    }
}
