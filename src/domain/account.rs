use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type AccountId = Uuid;
pub type OwnerId = Uuid;

/// Number of digits in a generated account number.
pub const ACCOUNT_NUMBER_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Everyday checking account
    Current,
    /// Savings account
    Savings,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Current => "current",
            AccountType::Savings => "savings",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "current" => Some(AccountType::Current),
            "savings" => Some(AccountType::Savings),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A customer account holding a balance.
///
/// The stored balance is authoritative and equals the sum of all committed
/// ledger entries referencing this account. It is only ever mutated through
/// the store's version-guarded commit paths; `version` is the
/// optimistic-concurrency token and advances on every balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Authenticated principal that owns this account. Immutable.
    pub owner_id: OwnerId,
    /// Unique human-displayable number, never reused. Immutable.
    pub account_number: String,
    pub account_type: AccountType,
    /// Balance in cents, >= 0 at every committed state.
    pub balance_cents: Cents,
    /// Incremented on every balance mutation.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        owner_id: OwnerId,
        account_number: String,
        account_type: AccountType,
        initial_balance_cents: Cents,
    ) -> Self {
        assert!(
            initial_balance_cents >= 0,
            "Initial balance must not be negative"
        );
        Self {
            id: Uuid::new_v4(),
            owner_id,
            account_number,
            account_type,
            balance_cents: initial_balance_cents,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Account number with all but the leading four digits hidden, for
    /// display surfaces that must not leak the full number.
    pub fn masked_number(&self) -> String {
        let visible: String = self.account_number.chars().take(4).collect();
        let hidden = self.account_number.chars().count().saturating_sub(4);
        format!("{}{}", visible, "X".repeat(hidden))
    }
}

/// Derive an account number from raw entropy: exactly `ACCOUNT_NUMBER_LEN`
/// decimal digits, zero-padded, leading digit allowed to be zero. Uniqueness
/// is checked against the store by the caller; collisions regenerate.
pub fn account_number_from_entropy(entropy: u128) -> String {
    let modulus = 10u128.pow(ACCOUNT_NUMBER_LEN as u32);
    format!(
        "{:0width$}",
        entropy % modulus,
        width = ACCOUNT_NUMBER_LEN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        for at in [AccountType::Current, AccountType::Savings] {
            let parsed = AccountType::from_str(at.as_str()).unwrap();
            assert_eq!(at, parsed);
        }
        assert!(AccountType::from_str("checking").is_none());
    }

    #[test]
    fn test_new_account_starts_at_version_zero() {
        let account = Account::new(
            Uuid::new_v4(),
            "0123456789".into(),
            AccountType::Current,
            5000,
        );
        assert_eq!(account.version, 0);
        assert_eq!(account.balance_cents, 5000);
    }

    #[test]
    #[should_panic(expected = "Initial balance must not be negative")]
    fn test_new_account_rejects_negative_balance() {
        Account::new(Uuid::new_v4(), "0123456789".into(), AccountType::Savings, -1);
    }

    #[test]
    fn test_masked_number() {
        let account = Account::new(
            Uuid::new_v4(),
            "9876543210".into(),
            AccountType::Savings,
            0,
        );
        assert_eq!(account.masked_number(), "9876XXXXXX");
    }

    #[test]
    fn test_account_number_from_entropy_is_fixed_width() {
        let number = account_number_from_entropy(42);
        assert_eq!(number.len(), ACCOUNT_NUMBER_LEN);
        assert_eq!(number, "0000000042");
        assert!(account_number_from_entropy(u128::MAX)
            .chars()
            .all(|c| c.is_ascii_digit()));
    }
}
