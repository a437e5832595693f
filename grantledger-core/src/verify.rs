//! End-to-end integrity verification
//!
//! A read-only sweep over a consistent snapshot of the ledger: re-derives
//! every entry hash, walks the chain links, consults the signature oracle
//! and re-checks every transaction's balance. Violations are reported,
//! never repaired.

use crate::canonical;
use crate::error::Result;
use crate::oracle::SignatureOracle;
use crate::types::{fixed2, Entry, Transaction};
use crate::validation::balance_tolerance;
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of an integrity sweep
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Violations; empty when the ledger is intact
    pub errors: Vec<String>,
    /// Non-fatal observations
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    /// True when no violations were found.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a `Result`, failing with
    /// [`crate::Error::IntegrityViolation`] when violations exist.
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::IntegrityViolation(self.errors))
        }
    }
}

/// Sweep a snapshot of entries and transactions.
///
/// `entries` must already be the time-ordered log (ascending timestamp,
/// creation sequence as tiebreaker), as [`crate::store::EntryStore::time_ordered`]
/// returns it.
pub async fn sweep(
    entries: &[Entry],
    transactions: &[Transaction],
    oracle: &dyn SignatureOracle,
) -> Result<IntegrityReport> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Per-entry hash recomputation.
    for entry in entries {
        let recomputed = canonical::hash_entry(entry)?;
        if recomputed != entry.hash {
            errors.push(format!("invalid hash on entry {}", entry.id));
        }
    }

    // Chain continuity over the time-ordered sequence.
    if let Some(first) = entries.first() {
        if first.previous_hash.is_some() {
            errors.push(format!(
                "broken chain at entry {}: first entry carries a previous hash",
                first.id
            ));
        }
    }
    for pair in entries.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.previous_hash.as_deref() != Some(previous.hash.as_str()) {
            errors.push(format!("broken chain at entry {}", current.id));
        }
    }

    // Signature oracle, per entry.
    for entry in entries {
        let report = oracle.verify_entry(entry).await?;
        for verdict in report.details.iter().filter(|d| !d.valid) {
            errors.push(format!(
                "invalid signature by {} on entry {}",
                verdict.signer, entry.id
            ));
        }
    }

    // Per-transaction balance over the authoritative entries.
    let mut by_transaction: HashMap<Uuid, Vec<&Entry>> = HashMap::new();
    for entry in entries {
        by_transaction.entry(entry.transaction_id).or_default().push(entry);
    }
    let tolerance = balance_tolerance();
    for tx in transactions {
        let net: Decimal = by_transaction
            .get(&tx.id)
            .map(|list| list.iter().map(|e| e.signed_amount()).sum())
            .unwrap_or(Decimal::ZERO);
        if net.abs() > tolerance {
            errors.push(format!(
                "unbalanced transaction {}: net {}",
                tx.id,
                fixed2(net)
            ));
        }
        if by_transaction.get(&tx.id).is_none() {
            warnings.push(format!("transaction {} has no entries in the log", tx.id));
        }
    }

    if !errors.is_empty() {
        tracing::error!(violations = errors.len(), "integrity sweep found violations");
    }
    Ok(IntegrityReport { errors, warnings })
}
