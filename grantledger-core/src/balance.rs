//! Derived account balances
//!
//! The index is a cache over the authoritative entry log, keyed by
//! `"{accountId}:{currency}"`. Executed transactions update it in place;
//! a miss is answered by deriving the balance from CONFIRMED entries and
//! memoizing the result. It can be dropped and rebuilt at any time.

use crate::store::EntryStore;
use crate::types::{Balance, Entry, EntryStatus};
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Cache of (account, currency) balances
#[derive(Debug, Default)]
pub struct BalanceIndex {
    balances: RwLock<HashMap<String, Balance>>,
}

/// Index key for an account/currency pair.
pub fn balance_key(account_id: &str, currency: &str) -> String {
    format!("{}:{}", account_id, currency)
}

impl BalanceIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the entries of an executed transaction: CREDIT adds, every
    /// other type subtracts. Called exactly once per execution.
    pub fn apply_execution(&self, entries: &[Entry]) {
        let mut balances = self.balances.write();
        let now = Utc::now();
        for entry in entries {
            let key = balance_key(&entry.account.id, &entry.currency);
            let balance = balances.entry(key).or_insert_with(|| Balance {
                account_id: entry.account.id.clone(),
                balance: Decimal::ZERO,
                currency: entry.currency.clone(),
                as_of: now,
                verified: false,
            });
            balance.balance += entry.signed_amount();
            balance.as_of = now;
            balance.verified = false;
        }
    }

    /// Current balance for an account/currency. A cache miss derives the
    /// balance from CONFIRMED entries, memoizes it and returns it with
    /// `verified = false`.
    pub fn get_account_balance(
        &self,
        store: &EntryStore,
        account_id: &str,
        currency: &str,
    ) -> Balance {
        let key = balance_key(account_id, currency);
        if let Some(balance) = self.balances.read().get(&key) {
            return balance.clone();
        }

        let derived = Balance {
            account_id: account_id.to_string(),
            balance: derive(store, account_id, currency),
            currency: currency.to_string(),
            as_of: Utc::now(),
            verified: false,
        };
        self.balances.write().insert(key, derived.clone());
        derived
    }

    /// Drop all cached balances.
    pub fn clear(&self) {
        self.balances.write().clear();
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.balances.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.balances.read().is_empty()
    }
}

/// Sum CREDIT minus DEBIT over all CONFIRMED entries for one account and
/// currency.
pub fn derive(store: &EntryStore, account_id: &str, currency: &str) -> Decimal {
    store
        .time_ordered()
        .iter()
        .filter(|e| {
            e.status == EntryStatus::Confirmed
                && e.account.id == account_id
                && e.currency == currency
        })
        .map(Entry::signed_amount)
        .sum()
}
