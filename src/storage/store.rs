use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::domain::{
    Account, AccountId, AccountType, Cents, OwnerId, TransactionId, TransactionRecord,
    TransactionStatus, TransactionType,
};

use super::MIGRATION_001_INITIAL;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable keyed storage for accounts and the append-only transaction ledger.
///
/// Every method is individually atomic against the underlying SQLite store;
/// no operation partially applies. Balance mutations always travel through
/// the version-guarded commit paths, so a stale writer observes a conflict
/// instead of clobbering a concurrent update.
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL. WAL keeps readers off
    /// the write lock so history queries never block transfers.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let store = Self::connect(database_url).await?;
        store.migrate().await?;
        Ok(store)
    }

    // ========================
    // Account operations
    // ========================

    /// Persist a new account. When the account opens with a non-zero balance
    /// the caller supplies an opening deposit record, written in the same
    /// transaction so the balance stays derivable from the ledger alone.
    pub async fn create_account(
        &self,
        account: &Account,
        opening: Option<&mut TransactionRecord>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin account creation")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, owner_id, account_number, account_type, balance_cents, version, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(account.owner_id.to_string())
        .bind(&account.account_number)
        .bind(account.account_type.as_str())
        .bind(account.balance_cents)
        .bind(account.version)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save account")?;

        if let Some(record) = opening {
            record.seq = next_seq(&mut tx).await?;
            insert_transaction(&mut tx, record).await?;
        }

        tx.commit().await.context("Failed to commit account creation")?;
        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, version, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// Whether an account number has ever been issued.
    pub async fn account_number_exists(&self, number: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM accounts WHERE account_number = ?")
            .bind(number)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to check account number")?;
        Ok(row.is_some())
    }

    /// List an owner's accounts in creation order.
    pub async fn list_accounts_for_owner(&self, owner_id: OwnerId) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, version, created_at
            FROM accounts
            WHERE owner_id = ?
            ORDER BY created_at, rowid
            "#,
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// List every account (integrity verification).
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, account_number, account_type, balance_cents, version, created_at
            FROM accounts
            ORDER BY created_at, rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    /// Compare-and-swap write of an account's balance. Succeeds only if the
    /// stored version still matches `expected_version`; the stored version
    /// advances by one on success. Returns false on a version conflict.
    pub async fn put_account_if_version_matches(
        &self,
        account: &Account,
        expected_version: i64,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_cents = ?, version = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(account.balance_cents)
        .bind(expected_version + 1)
        .bind(account.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .context("Failed to write account")?;

        Ok(updated.rows_affected() == 1)
    }

    /// Atomically debit `from` and credit `to` inside one transaction, each
    /// write guarded by the version the caller read. Returns false (leaving
    /// both accounts untouched) if either version no longer matches.
    ///
    /// Writes are applied in ascending account-id order regardless of which
    /// side is the source, so two opposite-direction transfers over the same
    /// pair always contend in the same order.
    pub async fn commit_transfer(
        &self,
        from: &Account,
        to: &Account,
        amount_cents: Cents,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transfer commit")?;

        let mut writes = [
            (from.id, from.version, -amount_cents),
            (to.id, to.version, amount_cents),
        ];
        writes.sort_by_key(|&(id, _, _)| id);

        for (id, version, delta) in writes {
            let updated = sqlx::query(
                r#"
                UPDATE accounts
                SET balance_cents = balance_cents + ?, version = version + 1
                WHERE id = ? AND version = ?
                "#,
            )
            .bind(delta)
            .bind(id.to_string())
            .bind(version)
            .execute(&mut *tx)
            .await
            .context("Failed to apply account write")?;

            if updated.rows_affected() != 1 {
                tx.rollback()
                    .await
                    .context("Failed to roll back conflicted commit")?;
                return Ok(false);
            }
        }

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(true)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Append a new transaction record to the ledger.
    /// Assigns the next sequence number.
    pub async fn append_transaction(&self, record: &mut TransactionRecord) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction append")?;

        record.seq = next_seq(&mut tx).await?;
        insert_transaction(&mut tx, record).await?;

        tx.commit().await.context("Failed to append transaction")?;
        Ok(())
    }

    /// Move a pending record to a terminal status. Records already terminal
    /// are left untouched; returns whether the transition applied.
    pub async fn update_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(status.as_str())
        .bind(id.to_string())
        .bind(TransactionStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update transaction status")?;

        Ok(updated.rows_affected() == 1)
    }

    /// Get a transaction record by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, seq, from_account_id, to_account_id, amount_cents,
                   transaction_type, status, description, client_ref, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// Look up a record by its caller-supplied idempotency anchor.
    pub async fn find_transaction_by_client_ref(
        &self,
        client_ref: &str,
    ) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, seq, from_account_id, to_account_id, amount_cents,
                   transaction_type, status, description, client_ref, created_at
            FROM transactions
            WHERE client_ref = ?
            "#,
        )
        .bind(client_ref)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction by client ref")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transaction(&row)?)),
            None => Ok(None),
        }
    }

    /// One page of an account's history, newest first.
    pub async fn history_page(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TransactionRecord>> {
        let id = account_id.to_string();
        let rows = sqlx::query(
            r#"
            SELECT id, seq, from_account_id, to_account_id, amount_cents,
                   transaction_type, status, description, client_ref, created_at
            FROM transactions
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY created_at DESC, seq DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(&id)
        .bind(&id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch history page")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Every record touching an account, oldest first (ledger replay).
    pub async fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>> {
        let id = account_id.to_string();
        let rows = sqlx::query(
            r#"
            SELECT id, seq, from_account_id, to_account_id, amount_cents,
                   transaction_type, status, description, client_ref, created_at
            FROM transactions
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY seq
            "#,
        )
        .bind(&id)
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// The full ledger, oldest first (integrity verification).
    pub async fn list_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, seq, from_account_id, to_account_id, amount_cents,
                   transaction_type, status, description, client_ref, created_at
            FROM transactions
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    // ========================
    // Row mapping
    // ========================

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let owner_str: String = row.get("owner_id");
        let type_str: String = row.get("account_type");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            owner_id: Uuid::parse_str(&owner_str).context("Invalid owner ID")?,
            account_number: row.get("account_number"),
            account_type: AccountType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid account type: {}", type_str))?,
            balance_cents: row.get("balance_cents"),
            version: row.get("version"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_transaction(row: &sqlx::sqlite::SqliteRow) -> Result<TransactionRecord> {
        let id_str: String = row.get("id");
        let from_str: Option<String> = row.get("from_account_id");
        let to_str: Option<String> = row.get("to_account_id");
        let type_str: String = row.get("transaction_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(TransactionRecord {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            seq: row.get("seq"),
            from_account: from_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid from_account ID")?,
            to_account: to_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid to_account ID")?,
            amount_cents: row.get("amount_cents"),
            transaction_type: TransactionType::from_str(&type_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", type_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            description: row.get("description"),
            client_ref: row.get("client_ref"),
            created_at: parse_timestamp(&created_at_str)?,
        })
    }
}

/// Get the next ledger sequence number and advance the counter.
async fn next_seq(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>) -> Result<i64> {
    let row = sqlx::query(
        r#"
        UPDATE sequence_counter
        SET value = value + 1
        WHERE name = 'transaction_seq'
        RETURNING value
        "#,
    )
    .fetch_one(&mut **tx)
    .await
    .context("Failed to get next sequence number")?;

    Ok(row.get("value"))
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    record: &TransactionRecord,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, seq, from_account_id, to_account_id, amount_cents,
                                  transaction_type, status, description, client_ref, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.seq)
    .bind(record.from_account.map(|id| id.to_string()))
    .bind(record.to_account.map(|id| id.to_string()))
    .bind(record.amount_cents)
    .bind(record.transaction_type.as_str())
    .bind(record.status.as_str())
    .bind(&record.description)
    .bind(&record.client_ref)
    .bind(record.created_at.to_rfc3339())
    .execute(&mut **tx)
    .await
    .context("Failed to save transaction")?;
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .context("Invalid timestamp")?
        .with_timezone(&Utc))
}
