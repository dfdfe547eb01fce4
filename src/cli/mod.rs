use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::api::{AccountResponse, TransactionResponse, TransferResponse};
use crate::application::{
    AccountService, CoreError, TransactionQueryService, TransferEngine, DEFAULT_PAGE_SIZE,
};
use crate::domain::{format_cents, parse_cents, AccountType};
use crate::storage::LedgerStore;

/// Corebank - account ledger and transfer engine
#[derive(Parser)]
#[command(name = "corebank")]
#[command(about = "A double-entry account ledger and money-transfer engine")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "corebank.db")]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Transfer funds between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Source account ID
        #[arg(long)]
        from: String,

        /// Destination account ID
        #[arg(long)]
        to: String,

        /// Description of the transfer
        #[arg(short = 'm', long)]
        description: Option<String>,

        /// Idempotency anchor; resubmitting with the same ref is safe
        #[arg(long)]
        client_ref: Option<String>,

        /// Print the API-shaped JSON response
        #[arg(long)]
        json: bool,
    },

    /// Deposit funds into an account
    Deposit {
        /// Account ID
        account: String,

        /// Amount to deposit (e.g., "50.00" or "50")
        amount: String,

        /// Description of the deposit
        #[arg(short = 'm', long)]
        description: Option<String>,
    },

    /// Withdraw funds from an account
    Withdraw {
        /// Account ID
        account: String,

        /// Amount to withdraw (e.g., "50.00" or "50")
        amount: String,

        /// Description of the withdrawal
        #[arg(short = 'm', long)]
        description: Option<String>,
    },

    /// Show the balance of an account
    Balance {
        /// Account ID
        account: String,
    },

    /// Show an account's transaction history, newest first
    History {
        /// Account ID
        account: String,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: i64,

        /// Records per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: i64,

        /// Export the full history as CSV to the given file instead
        #[arg(long)]
        export: Option<String>,

        /// Print the API-shaped JSON response
        #[arg(long)]
        json: bool,
    },

    /// Verify that stored balances match the replayed ledger
    Check,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account for an owner
    Create {
        /// Owner ID (UUID of the authenticated principal)
        #[arg(long)]
        owner: String,

        /// Account type: current, savings
        #[arg(short = 't', long = "type")]
        account_type: String,

        /// Opening balance (e.g., "100.00"; defaults to zero)
        #[arg(long)]
        initial_balance: Option<String>,
    },

    /// List an owner's accounts in creation order
    List {
        /// Owner ID
        #[arg(long)]
        owner: String,

        /// Print the API-shaped JSON response
        #[arg(long)]
        json: bool,
    },

    /// Show detailed account information
    Show {
        /// Account ID
        id: String,
    },
}

/// The three service interfaces over one shared store.
struct Services {
    accounts: AccountService,
    engine: TransferEngine,
    queries: TransactionQueryService,
}

impl Services {
    fn over(store: LedgerStore) -> Self {
        let store = Arc::new(store);
        Self {
            accounts: AccountService::new(store.clone()),
            engine: TransferEngine::new(store.clone()),
            queries: TransactionQueryService::new(store),
        }
    }
}

impl Cli {
    async fn open(&self) -> Result<Services> {
        let store = LedgerStore::connect(&format!("sqlite:{}", self.database)).await?;
        Ok(Services::over(store))
    }

    pub async fn run(self) -> Result<()> {
        match &self.command {
            Commands::Init => {
                LedgerStore::init(&format!("sqlite:{}?mode=rwc", self.database)).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Account(account_cmd) => {
                let services = self.open().await?;
                run_account_command(&services, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                from,
                to,
                description,
                client_ref,
                json,
            } => {
                let services = self.open().await?;
                let amount_cents = parse_amount(amount)?;
                let from = parse_account_id(from)?;
                let to = parse_account_id(to)?;

                let outcome = services
                    .engine
                    .transfer(
                        from,
                        to,
                        amount_cents,
                        description.clone(),
                        client_ref.clone(),
                    )
                    .await;

                match outcome {
                    Ok(record) => {
                        if *json {
                            let response = TransferResponse::completed(&record);
                            println!("{}", serde_json::to_string_pretty(&response)?);
                        } else {
                            println!(
                                "Transfer {}: {} {} -> {} ({})",
                                record.status,
                                format_cents(record.amount_cents),
                                from,
                                to,
                                record.id
                            );
                        }
                    }
                    Err(err) => {
                        if *json {
                            let response = TransferResponse::failed(&err);
                            println!("{}", serde_json::to_string_pretty(&response)?);
                        }
                        return Err(err.into());
                    }
                }
            }

            Commands::Deposit {
                account,
                amount,
                description,
            } => {
                let services = self.open().await?;
                let account_id = parse_account_id(account)?;
                let amount_cents = parse_amount(amount)?;

                let record = services
                    .engine
                    .deposit(account_id, amount_cents, description.clone())
                    .await?;
                println!(
                    "Deposited {} into {} ({})",
                    format_cents(record.amount_cents),
                    account_id,
                    record.id
                );
            }

            Commands::Withdraw {
                account,
                amount,
                description,
            } => {
                let services = self.open().await?;
                let account_id = parse_account_id(account)?;
                let amount_cents = parse_amount(amount)?;

                let record = services
                    .engine
                    .withdraw(account_id, amount_cents, description.clone())
                    .await?;
                println!(
                    "Withdrew {} from {} ({})",
                    format_cents(record.amount_cents),
                    account_id,
                    record.id
                );
            }

            Commands::Balance { account } => {
                let services = self.open().await?;
                let account_id = parse_account_id(account)?;
                let balance = services.accounts.balance(account_id).await?;
                println!("{}", format_cents(balance));
            }

            Commands::History {
                account,
                page,
                page_size,
                export,
                json,
            } => {
                let services = self.open().await?;
                let account_id = parse_account_id(account)?;

                if let Some(path) = export {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("Failed to create output file: {}", path))?;
                    let count = services
                        .queries
                        .export_history_csv(account_id, file)
                        .await?;
                    eprintln!("Exported {} transactions", count);
                } else {
                    let records = services
                        .queries
                        .history(account_id, *page, *page_size)
                        .await?;
                    if *json {
                        let response: Vec<TransactionResponse> =
                            records.iter().map(TransactionResponse::from).collect();
                        println!("{}", serde_json::to_string_pretty(&response)?);
                    } else {
                        print_history(account_id, &records);
                    }
                }
            }

            Commands::Check => {
                let services = self.open().await?;
                let report = services.accounts.verify_integrity().await?;

                println!(
                    "Accounts: {}  Transactions: {}  Pending: {}",
                    report.account_count, report.transaction_count, report.pending_count
                );
                if report.is_consistent() {
                    println!("Ledger is consistent.");
                } else {
                    for mismatch in &report.mismatches {
                        println!(
                            "MISMATCH {}: stored {} != derived {}",
                            mismatch.account,
                            format_cents(mismatch.stored_cents),
                            format_cents(mismatch.derived_cents)
                        );
                    }
                    for account in &report.negative_balances {
                        println!("NEGATIVE BALANCE {}", account);
                    }
                    anyhow::bail!("Ledger integrity check failed");
                }
            }
        }

        Ok(())
    }
}

async fn run_account_command(services: &Services, cmd: &AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            owner,
            account_type,
            initial_balance,
        } => {
            let owner_id = parse_owner_id(owner)?;
            let account_type = AccountType::from_str(account_type).with_context(|| {
                format!(
                    "Invalid account type '{}'. Valid types: current, savings",
                    account_type
                )
            })?;
            // Zero is a legal opening balance; the service rejects negatives.
            let initial_cents = match initial_balance {
                Some(amount) => {
                    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?
                }
                None => 0,
            };

            let account = services
                .accounts
                .create_account(owner_id, account_type, initial_cents)
                .await?;
            println!(
                "Created {} account {} ({})",
                account.account_type, account.account_number, account.id
            );
        }

        AccountCommands::List { owner, json } => {
            let owner_id = parse_owner_id(owner)?;
            let accounts = services.accounts.accounts_for_owner(owner_id).await?;

            if *json {
                let response: Vec<AccountResponse> =
                    accounts.iter().map(AccountResponse::from).collect();
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<38} {:<12} {:<10} {:>14}", "ID", "NUMBER", "TYPE", "BALANCE");
                println!("{}", "-".repeat(76));
                for account in accounts {
                    println!(
                        "{:<38} {:<12} {:<10} {:>14}",
                        account.id,
                        account.masked_number(),
                        account.account_type,
                        format_cents(account.balance_cents)
                    );
                }
            }
        }

        AccountCommands::Show { id } => {
            let account_id = parse_account_id(id)?;
            let account = services.accounts.account(account_id).await?;

            println!("Account: {}", account.id);
            println!("  Owner:    {}", account.owner_id);
            println!("  Number:   {}", account.masked_number());
            println!("  Type:     {}", account.account_type);
            println!("  Balance:  {}", format_cents(account.balance_cents));
            println!("  Version:  {}", account.version);
            println!(
                "  Created:  {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    Ok(())
}

fn print_history(account_id: Uuid, records: &[crate::domain::TransactionRecord]) {
    if records.is_empty() {
        println!("No transactions found.");
        return;
    }
    println!(
        "{:<20} {:<11} {:<10} {:>14}  {}",
        "DATE", "TYPE", "STATUS", "AMOUNT", "DESCRIPTION"
    );
    println!("{}", "-".repeat(76));
    for record in records {
        // Sign is derived here, not stored: debit if the viewed account is
        // the source, credit if it is the destination.
        let signed = record.effect_on(account_id).unwrap_or(0);
        println!(
            "{:<20} {:<11} {:<10} {:>14}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.transaction_type,
            record.status,
            format_cents(signed),
            record.description.as_deref().unwrap_or("")
        );
    }
}

fn parse_amount(input: &str) -> Result<i64> {
    let cents = parse_cents(input).context("Invalid amount format. Use '50.00' or '50'")?;
    if cents <= 0 {
        // Surface the same error kind the services would.
        return Err(CoreError::InvalidAmount("Amount must be positive".to_string()).into());
    }
    Ok(cents)
}

fn parse_account_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).context("Invalid account ID format (expected UUID)")
}

fn parse_owner_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input).context("Invalid owner ID format (expected UUID)")
}
