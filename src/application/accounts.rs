use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{
    account_number_from_entropy, build_integrity_report, Account, AccountId, AccountType, Cents,
    IntegrityReport, OwnerId, TransactionRecord, TransactionStatus,
};
use crate::storage::LedgerStore;

use super::CoreError;

/// Bound on account-number generation; a collision regenerates.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 16;

/// Account lifecycle and balance queries. Authorization is enforced by the
/// caller, which resolves the authenticated principal to an `OwnerId`; this
/// service still checks existence on every lookup.
pub struct AccountService {
    store: Arc<LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Create an account for an owner. A non-zero initial balance is written
    /// together with an opening-deposit ledger entry in the same store
    /// transaction, keeping the balance derivable from the ledger alone.
    pub async fn create_account(
        &self,
        owner_id: OwnerId,
        account_type: AccountType,
        initial_balance_cents: Cents,
    ) -> Result<Account, CoreError> {
        if initial_balance_cents < 0 {
            return Err(CoreError::InvalidAmount(
                "Initial balance must not be negative".to_string(),
            ));
        }

        let number = self.issue_account_number().await?;
        let account = Account::new(owner_id, number, account_type, initial_balance_cents);

        let mut opening = (initial_balance_cents > 0).then(|| {
            let mut record = TransactionRecord::deposit(account.id, initial_balance_cents)
                .with_description("Opening balance");
            // Committed atomically with the account row, so it is never
            // observable in a non-terminal state.
            record.status = TransactionStatus::Completed;
            record
        });

        self.store.create_account(&account, opening.as_mut()).await?;

        info!(
            account = %account.id,
            owner = %owner_id,
            number = %account.masked_number(),
            "account created"
        );
        Ok(account)
    }

    /// Get an account by ID.
    pub async fn account(&self, account_id: AccountId) -> Result<Account, CoreError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(CoreError::AccountNotFound(account_id))
    }

    /// An owner's accounts in creation order.
    pub async fn accounts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>, CoreError> {
        Ok(self.store.list_accounts_for_owner(owner_id).await?)
    }

    /// Current balance of an account.
    pub async fn balance(&self, account_id: AccountId) -> Result<Cents, CoreError> {
        Ok(self.account(account_id).await?.balance_cents)
    }

    /// Cross-check every stored balance against the replayed ledger.
    pub async fn verify_integrity(&self) -> Result<IntegrityReport, CoreError> {
        let accounts = self.store.list_accounts().await?;
        let records = self.store.list_transactions().await?;

        let stored: Vec<(AccountId, Cents)> = accounts
            .iter()
            .map(|a| (a.id, a.balance_cents))
            .collect();

        Ok(build_integrity_report(&stored, &records))
    }

    async fn issue_account_number(&self) -> Result<String, CoreError> {
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let candidate = account_number_from_entropy(Uuid::new_v4().as_u128());
            if !self.store.account_number_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(CoreError::StoreUnavailable(anyhow::anyhow!(
            "Could not issue a unique account number after {} attempts",
            ACCOUNT_NUMBER_ATTEMPTS
        )))
    }
}
