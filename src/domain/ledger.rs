use std::collections::HashMap;

use super::{AccountId, Cents, TransactionRecord, TransactionStatus};

/// Replay the committed ledger entries touching one account.
/// Only `Completed` records move balances; pending and failed entries are
/// ignored, so the result equals the account's authoritative balance.
pub fn replay_balance(account: AccountId, records: &[TransactionRecord]) -> Cents {
    records
        .iter()
        .filter(|r| r.status == TransactionStatus::Completed)
        .filter_map(|r| r.effect_on(account))
        .sum()
}

/// Net effect of a record set on every referenced account.
pub fn replay_all_balances(records: &[TransactionRecord]) -> HashMap<AccountId, Cents> {
    let mut balances: HashMap<AccountId, Cents> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| r.status == TransactionStatus::Completed)
    {
        if let Some(from) = record.from_account {
            *balances.entry(from).or_insert(0) -= record.amount_cents;
        }
        if let Some(to) = record.to_account {
            *balances.entry(to).or_insert(0) += record.amount_cents;
        }
    }
    balances
}

/// One account whose stored balance disagrees with its replayed ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceMismatch {
    pub account: AccountId,
    pub stored_cents: Cents,
    pub derived_cents: Cents,
}

/// Ledger-wide consistency report.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    /// Records stuck in `Pending`; an external reconciliation sweep resolves
    /// these once they age past a timeout
    pub pending_count: usize,
    pub mismatches: Vec<BalanceMismatch>,
    pub negative_balances: Vec<AccountId>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.negative_balances.is_empty()
    }
}

/// Cross-check every account's stored balance against the full replayed
/// ledger. `stored` pairs each account with its persisted balance.
pub fn build_integrity_report(
    stored: &[(AccountId, Cents)],
    records: &[TransactionRecord],
) -> IntegrityReport {
    let derived = replay_all_balances(records);

    let mismatches = stored
        .iter()
        .filter_map(|&(account, stored_cents)| {
            let derived_cents = derived.get(&account).copied().unwrap_or(0);
            (stored_cents != derived_cents).then_some(BalanceMismatch {
                account,
                stored_cents,
                derived_cents,
            })
        })
        .collect();

    let negative_balances = stored
        .iter()
        .filter(|&&(_, cents)| cents < 0)
        .map(|&(account, _)| account)
        .collect();

    IntegrityReport {
        account_count: stored.len(),
        transaction_count: records.len(),
        pending_count: records
            .iter()
            .filter(|r| r.status == TransactionStatus::Pending)
            .count(),
        mismatches,
        negative_balances,
    }
}
