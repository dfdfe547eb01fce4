use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{AccountId, Cents, TransactionId, TransactionRecord, TransactionStatus};
use crate::storage::LedgerStore;

use super::CoreError;

/// Commit attempts per operation before surfacing `TransferConflict`.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Executes funds movements as single atomic operations.
///
/// A transfer spans two accounts and one ledger record. The record is
/// appended `Pending` before any balance is touched and always reaches a
/// terminal status: `Completed` when both version-guarded account writes
/// land, `Failed` otherwise — in which case both accounts are left exactly
/// as they were. A version conflict re-reads both accounts and recomputes
/// from scratch, up to the retry bound.
pub struct TransferEngine {
    store: Arc<LedgerStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Move `amount_cents` from one account to another.
    ///
    /// `client_ref` is the caller's idempotency anchor: resubmitting a
    /// request with a ref the ledger has already seen returns the original
    /// record without moving funds again.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
        description: Option<String>,
        client_ref: Option<String>,
    ) -> Result<TransactionRecord, CoreError> {
        if from == to {
            return Err(CoreError::SameAccount);
        }
        if amount_cents <= 0 {
            return Err(CoreError::InvalidAmount(
                "Transfer amount must be positive".to_string(),
            ));
        }

        if let Some(anchor) = client_ref.as_deref() {
            if let Some(existing) = self.store.find_transaction_by_client_ref(anchor).await? {
                debug!(
                    transaction = %existing.id,
                    client_ref = anchor,
                    "resubmitted request, returning original record"
                );
                return Ok(existing);
            }
        }

        // Validation happens before the pending record is written; from here
        // on every outcome leaves a terminal record behind.
        self.require_account(from).await?;
        self.require_account(to).await?;

        let mut record = TransactionRecord::transfer(from, to, amount_cents);
        if let Some(description) = description {
            record = record.with_description(description);
        }
        if let Some(client_ref) = client_ref {
            record = record.with_client_ref(client_ref);
        }
        self.store.append_transaction(&mut record).await?;

        match self.commit_with_retries(from, to, amount_cents).await {
            Ok(()) => self.finish(record).await,
            Err(err) => {
                self.mark_failed(record.id).await;
                Err(err)
            }
        }
    }

    /// Credit a single account from outside the ledger.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<TransactionRecord, CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::InvalidAmount(
                "Deposit amount must be positive".to_string(),
            ));
        }
        self.require_account(account_id).await?;

        let mut record = TransactionRecord::deposit(account_id, amount_cents);
        if let Some(description) = description {
            record = record.with_description(description);
        }
        self.store.append_transaction(&mut record).await?;

        match self.adjust_with_retries(account_id, amount_cents).await {
            Ok(()) => self.finish(record).await,
            Err(err) => {
                self.mark_failed(record.id).await;
                Err(err)
            }
        }
    }

    /// Debit a single account to outside the ledger.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount_cents: Cents,
        description: Option<String>,
    ) -> Result<TransactionRecord, CoreError> {
        if amount_cents <= 0 {
            return Err(CoreError::InvalidAmount(
                "Withdrawal amount must be positive".to_string(),
            ));
        }
        self.require_account(account_id).await?;

        let mut record = TransactionRecord::withdrawal(account_id, amount_cents);
        if let Some(description) = description {
            record = record.with_description(description);
        }
        self.store.append_transaction(&mut record).await?;

        match self.adjust_with_retries(account_id, -amount_cents).await {
            Ok(()) => self.finish(record).await,
            Err(err) => {
                self.mark_failed(record.id).await;
                Err(err)
            }
        }
    }

    /// Optimistic two-account commit loop. Balances and versions are
    /// re-read on every attempt; sufficiency is checked against the freshly
    /// read state so a concurrent drain cannot slip a balance below zero.
    async fn commit_with_retries(
        &self,
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
    ) -> Result<(), CoreError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let from_account = self.require_account(from).await?;
            let to_account = self.require_account(to).await?;

            if from_account.balance_cents < amount_cents {
                return Err(CoreError::InsufficientFunds {
                    account: from,
                    balance_cents: from_account.balance_cents,
                    requested_cents: amount_cents,
                });
            }

            if self
                .store
                .commit_transfer(&from_account, &to_account, amount_cents)
                .await?
            {
                return Ok(());
            }
            debug!(attempt, "version conflict, re-reading accounts");
        }

        warn!(%from, %to, "transfer aborted after repeated version conflicts");
        Err(CoreError::TransferConflict)
    }

    /// Single-account variant of the commit loop, for deposits/withdrawals.
    async fn adjust_with_retries(
        &self,
        account_id: AccountId,
        delta: Cents,
    ) -> Result<(), CoreError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut account = self.require_account(account_id).await?;
            let new_balance = account.balance_cents + delta;

            if new_balance < 0 {
                return Err(CoreError::InsufficientFunds {
                    account: account_id,
                    balance_cents: account.balance_cents,
                    requested_cents: -delta,
                });
            }

            let expected_version = account.version;
            account.balance_cents = new_balance;
            if self
                .store
                .put_account_if_version_matches(&account, expected_version)
                .await?
            {
                return Ok(());
            }
            debug!(attempt, "version conflict, re-reading account");
        }

        warn!(account = %account_id, "balance change aborted after repeated version conflicts");
        Err(CoreError::TransferConflict)
    }

    async fn finish(
        &self,
        mut record: TransactionRecord,
    ) -> Result<TransactionRecord, CoreError> {
        self.store
            .update_transaction_status(record.id, TransactionStatus::Completed)
            .await?;
        record.status = TransactionStatus::Completed;
        info!(
            transaction = %record.id,
            kind = %record.transaction_type,
            amount = record.amount_cents,
            "transaction completed"
        );
        Ok(record)
    }

    /// Best-effort terminal mark; the originating error is what propagates,
    /// so a failure here is only logged. An unmarked record stays `Pending`
    /// for the external reconciliation sweep.
    async fn mark_failed(&self, id: TransactionId) {
        if let Err(err) = self
            .store
            .update_transaction_status(id, TransactionStatus::Failed)
            .await
        {
            warn!(transaction = %id, error = %err, "could not mark transaction failed");
        }
    }

    async fn require_account(
        &self,
        account_id: AccountId,
    ) -> Result<crate::domain::Account, CoreError> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or(CoreError::AccountNotFound(account_id))
    }
}
