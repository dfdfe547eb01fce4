mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{account_pair, balance_of, test_bank};
use corebank::application::{CoreError, TransferEngine};
use corebank::domain::{AccountId, Cents};

/// Client-side retry loop for errors the engine marks retry-safe.
async fn transfer_until_terminal(
    engine: &TransferEngine,
    from: AccountId,
    to: AccountId,
    amount: Cents,
) -> Result<(), CoreError> {
    for _ in 0..50 {
        match engine.transfer(from, to, amount, None, None).await {
            Ok(_) => return Ok(()),
            Err(err) if err.is_retryable() => continue,
            Err(err) => return Err(err),
        }
    }
    panic!("transfer did not reach a terminal outcome within 50 attempts");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_drain_source_exactly() -> Result<()> {
    let (bank, _temp) = test_bank().await?;
    // X starts with exactly N * a; every transfer must land
    let n: i64 = 4;
    let amount: Cents = 10_000;
    let (_, x, y) = account_pair(&bank, n * amount, 0).await?;

    let mut tasks = Vec::new();
    for _ in 0..n {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (x.id, y.id);
        tasks.push(tokio::spawn(async move {
            engine.transfer(from, to, amount, None, None).await
        }));
    }

    for task in tasks {
        task.await?.expect("every transfer must succeed");
    }

    assert_eq!(balance_of(&bank, &x).await?, 0);
    assert_eq!(balance_of(&bank, &y).await?, n * amount);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_heavier_contention_with_client_retries() -> Result<()> {
    let (bank, _temp) = test_bank().await?;
    let n: i64 = 10;
    let amount: Cents = 5_000;
    let (_, x, y) = account_pair(&bank, n * amount, 0).await?;

    let mut tasks = Vec::new();
    for _ in 0..n {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (x.id, y.id);
        tasks.push(tokio::spawn(async move {
            transfer_until_terminal(&engine, from, to, amount).await
        }));
    }

    for task in tasks {
        task.await?.expect("every retried transfer must land");
    }

    assert_eq!(balance_of(&bank, &x).await?, 0);
    assert_eq!(balance_of(&bank, &y).await?, n * amount);

    let report = bank.accounts.verify_integrity().await?;
    assert!(report.is_consistent(), "report: {:?}", report);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_concurrent_transfers_overdraw_exactly_once() -> Result<()> {
    let (bank, _temp) = test_bank().await?;
    // A=700.00 and two concurrent 400.00 transfers: exactly one wins
    let (_, a, b) = account_pair(&bank, 70_000, 50_000).await?;

    let first = {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (a.id, b.id);
        tokio::spawn(async move { engine.transfer(from, to, 40_000, None, None).await })
    };
    let second = {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (a.id, b.id);
        tokio::spawn(async move { engine.transfer(from, to, 40_000, None, None).await })
    };

    let outcomes = [first.await?, second.await?];
    let successes = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(successes, 1, "exactly one transfer must win");
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Err(CoreError::InsufficientFunds { .. }))));

    assert_eq!(balance_of(&bank, &a).await?, 30_000);
    assert_eq!(balance_of(&bank, &b).await?, 90_000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_direction_transfers_on_same_pair() -> Result<()> {
    let (bank, _temp) = test_bank().await?;
    // Opposite directions over the same pair: fixed-order account writes
    // mean both settle without deadlock or lost updates
    let (_, a, b) = account_pair(&bank, 100_000, 100_000).await?;

    let forward = {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (a.id, b.id);
        tokio::spawn(async move { transfer_until_terminal(&engine, from, to, 30_000).await })
    };
    let backward = {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (b.id, a.id);
        tokio::spawn(async move { transfer_until_terminal(&engine, from, to, 10_000).await })
    };

    forward.await?.expect("forward transfer must land");
    backward.await?.expect("backward transfer must land");

    assert_eq!(balance_of(&bank, &a).await?, 80_000);
    assert_eq!(balance_of(&bank, &b).await?, 120_000);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_pairs_run_concurrently_and_conserve() -> Result<()> {
    let (bank, _temp) = test_bank().await?;
    let (_, a, b) = account_pair(&bank, 40_000, 0).await?;
    let (_, c, d) = account_pair(&bank, 60_000, 0).await?;
    let total_before = 100_000;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (a.id, b.id);
        tasks.push(tokio::spawn(async move {
            transfer_until_terminal(&engine, from, to, 10_000).await
        }));
        let engine = Arc::clone(&bank.engine);
        let (from, to) = (c.id, d.id);
        tasks.push(tokio::spawn(async move {
            transfer_until_terminal(&engine, from, to, 15_000).await
        }));
    }

    for task in tasks {
        task.await?.expect("transfers over disjoint pairs must land");
    }

    assert_eq!(balance_of(&bank, &a).await?, 0);
    assert_eq!(balance_of(&bank, &b).await?, 40_000);
    assert_eq!(balance_of(&bank, &c).await?, 0);
    assert_eq!(balance_of(&bank, &d).await?, 60_000);

    let total_after = balance_of(&bank, &a).await?
        + balance_of(&bank, &b).await?
        + balance_of(&bank, &c).await?
        + balance_of(&bank, &d).await?;
    assert_eq!(total_before, total_after);

    let report = bank.accounts.verify_integrity().await?;
    assert!(report.is_consistent(), "report: {:?}", report);

    Ok(())
}
