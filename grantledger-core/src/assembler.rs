//! Transaction assembly
//!
//! Builds a balanced transaction out of entry drafts. Entries are staged
//! against the current chain tip and only committed to the store once the
//! assembled transaction validates, so a failed assembly never moves the
//! tip or leaves orphaned entries behind.

use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::store::{EntryDraft, EntryStore};
use crate::types::{
    fixed2, Entry, EntryType, Transaction, TransactionStatus, TransactionType,
};
use crate::validation::{balance_tolerance, LedgerValidator, PolicyRules};
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Assembles balanced transactions from entry drafts
#[derive(Debug)]
pub struct TransactionAssembler {
    required_signatures: u8,
}

impl TransactionAssembler {
    /// Build an assembler from the ledger configuration. With multi-sig
    /// disabled every transaction approves after a single signature.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            required_signatures: if config.enable_multi_signature {
                config.required_signatures
            } else {
                1
            },
        }
    }

    /// Assemble, validate and commit a transaction.
    ///
    /// Fails with [`Error::UnbalancedEntries`] before any entry is
    /// materialized; fails with [`Error::ValidationFailed`] after staging
    /// but before the store tip moves. When `policy` is given, its rules
    /// are evaluated in the same pre-commit pass.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        store: &mut EntryStore,
        validator: &LedgerValidator,
        grant_cycle_id: &str,
        transaction_type: TransactionType,
        drafts: Vec<EntryDraft>,
        description: &str,
        policy_id: Option<String>,
        policy: Option<&PolicyRules>,
    ) -> Result<Transaction> {
        for draft in &drafts {
            if draft.amount < Decimal::ZERO {
                return Err(Error::AmountOutOfRange {
                    amount: draft.amount,
                });
            }
        }

        let currency = drafts
            .first()
            .map(|d| d.currency.clone())
            .unwrap_or_default();
        for draft in &drafts {
            if draft.currency != currency {
                return Err(Error::CurrencyMismatch {
                    expected: currency,
                    found: draft.currency.clone(),
                });
            }
        }

        // CREDIT contributes +1, everything else (DEBIT, ADJUSTMENT) -1.
        let net: Decimal = drafts
            .iter()
            .map(|d| match d.entry_type {
                EntryType::Credit => d.amount,
                _ => -d.amount,
            })
            .sum();
        if net.abs() > balance_tolerance() {
            return Err(Error::UnbalancedEntries { net: net.abs() });
        }

        // Stage entries chained off the current tip.
        let transaction_id = Uuid::new_v4();
        let mut previous = store.tip().map(String::from);
        let mut staged: Vec<Entry> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entry =
                EntryStore::materialize(grant_cycle_id, transaction_id, draft, previous)?;
            previous = Some(entry.hash.clone());
            staged.push(entry);
        }

        let total_amount = credit_total(&staged);

        let mut tx = Transaction {
            id: transaction_id,
            timestamp: Utc::now(),
            grant_cycle_id: grant_cycle_id.to_string(),
            transaction_type,
            description: description.to_string(),
            entries: staged.iter().map(|e| e.id).collect(),
            total_amount,
            currency,
            policy_id,
            required_signatures: self.required_signatures,
            received_signatures: vec![],
            status: TransactionStatus::Draft,
            execution_timestamp: None,
            blockchain: None,
            audit_trail: vec![],
        };
        tx.audit("CREATED", "system", None);

        let mut result = validator.validate_transaction(&tx, &staged);
        if let Some(rules) = policy {
            let policy_result = validator.validate_against_policies(&tx, &staged, rules);
            result.errors.extend(policy_result.errors);
            result.warnings.extend(policy_result.warnings);
        }
        for warning in &result.warnings {
            tracing::warn!(transaction_id = %tx.id, "{}", warning);
        }
        if !result.valid() {
            return Err(Error::ValidationFailed(result.errors));
        }

        store.commit(staged);
        tracing::debug!(
            transaction_id = %tx.id,
            total = %fixed2(tx.total_amount),
            "transaction assembled"
        );
        Ok(tx)
    }
}

/// Sum of CREDIT magnitudes, truncated to two fractional digits.
pub(crate) fn credit_total(entries: &[Entry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.entry_type == EntryType::Credit)
        .map(|e| e.amount)
        .sum::<Decimal>()
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
}
