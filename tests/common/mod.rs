// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use corebank::application::{AccountService, TransactionQueryService, TransferEngine};
use corebank::domain::{Account, AccountType, Cents, OwnerId};
use corebank::LedgerStore;
use tempfile::TempDir;
use uuid::Uuid;

/// The three service interfaces wired over one temporary store.
pub struct TestBank {
    pub accounts: AccountService,
    pub engine: Arc<TransferEngine>,
    pub queries: TransactionQueryService,
    pub store: Arc<LedgerStore>,
}

/// Helper to create the services over a temporary database
pub async fn test_bank() -> Result<(TestBank, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let store = Arc::new(
        LedgerStore::init(&format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap())).await?,
    );

    Ok((
        TestBank {
            accounts: AccountService::new(store.clone()),
            engine: Arc::new(TransferEngine::new(store.clone())),
            queries: TransactionQueryService::new(store.clone()),
            store,
        },
        temp_dir,
    ))
}

/// Fresh principal for tests that don't care about a specific owner.
pub fn test_owner() -> OwnerId {
    Uuid::new_v4()
}

/// Create one funded current account.
pub async fn funded_account(bank: &TestBank, owner: OwnerId, cents: Cents) -> Result<Account> {
    Ok(bank
        .accounts
        .create_account(owner, AccountType::Current, cents)
        .await?)
}

/// Standard two-account fixture: A and B for the same owner.
pub async fn account_pair(
    bank: &TestBank,
    a_cents: Cents,
    b_cents: Cents,
) -> Result<(OwnerId, Account, Account)> {
    let owner = test_owner();
    let a = funded_account(bank, owner, a_cents).await?;
    let b = funded_account(bank, owner, b_cents).await?;
    Ok((owner, a, b))
}

/// Re-read an account's balance through the service.
pub async fn balance_of(bank: &TestBank, account: &Account) -> Result<Cents> {
    Ok(bank.accounts.balance(account.id).await?)
}
