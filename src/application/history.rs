use std::io::Write;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::{AccountId, TransactionRecord};
use crate::storage::LedgerStore;

use super::CoreError;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Read-only projections of an account's transaction history.
///
/// Records are returned direction-neutral; the caller derives debit/credit
/// by comparing `from_account` with the account it is viewing. Terminal
/// records never change, so these reads take no locks.
pub struct TransactionQueryService {
    store: Arc<LedgerStore>,
}

impl TransactionQueryService {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// One page of history, newest first. `page` is 1-based; `page_size` is
    /// clamped to [1, MAX_PAGE_SIZE].
    pub async fn history(
        &self,
        account_id: AccountId,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        self.require_account(account_id).await?;

        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * page_size;

        Ok(self.store.history_page(account_id, page_size, offset).await?)
    }

    /// Every record touching an account, oldest first.
    pub async fn full_history(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        self.require_account(account_id).await?;
        Ok(self.store.transactions_for_account(account_id).await?)
    }

    /// Export an account's full history as a CSV statement.
    pub async fn export_history_csv<W: Write>(
        &self,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize> {
        let records = self.full_history(account_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "seq",
            "created_at",
            "type",
            "status",
            "from_account",
            "to_account",
            "amount_cents",
            "description",
        ])?;

        let mut count = 0;
        for record in &records {
            csv_writer.write_record([
                record.id.to_string(),
                record.seq.to_string(),
                record.created_at.to_rfc3339(),
                record.transaction_type.to_string(),
                record.status.to_string(),
                record
                    .from_account
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                record
                    .to_account
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                record.amount_cents.to_string(),
                record.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    async fn require_account(&self, account_id: AccountId) -> Result<(), CoreError> {
        self.store
            .get_account(account_id)
            .await?
            .map(|_| ())
            .ok_or(CoreError::AccountNotFound(account_id))
    }
}
