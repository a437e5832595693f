//! Schema and business-rule validation
//!
//! Validation never mutates; it returns the full list of errors and
//! warnings so callers can surface everything at once. Transaction
//! validation prefixes entry-level errors with the offending entry id.

use crate::config::LedgerConfig;
use crate::types::{fixed2, Entry, Transaction, TransactionType};
use chrono::Timelike;
use regex::Regex;
use rust_decimal::Decimal;

/// Maximum entry description length
const MAX_ENTRY_DESCRIPTION: usize = 1000;
/// Maximum transaction description length
const MAX_TRANSACTION_DESCRIPTION: usize = 2000;
/// Balance tolerance (0.01), kept for compatibility with legacy
/// float-derived data.
pub fn balance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Outcome of a validation pass
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Blocking problems
    pub errors: Vec<String>,
    /// Non-blocking observations
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// True when no errors were recorded.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another result in, prefixing each message.
    fn absorb_prefixed(&mut self, prefix: &str, other: ValidationResult) {
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{}: {}", prefix, e)));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{}: {}", prefix, w)));
    }
}

/// Policy rules evaluated as an optional overlay on transactions
#[derive(Debug, Clone)]
pub struct PolicyRules {
    /// Policy identifier
    pub policy_id: String,
    /// Transaction types the policy permits; empty means all
    pub allowed_transaction_types: Vec<TransactionType>,
    /// Policy-level amount ceiling
    pub max_amount: Option<Decimal>,
    /// Inclusive [start, end] hour window (UTC); outside is a warning only
    pub business_hours: Option<(u32, u32)>,
    /// Beneficiary account ids the policy blocks
    pub blocked_beneficiaries: Vec<String>,
}

/// Validator over entries, transactions and policies
#[derive(Debug)]
pub struct LedgerValidator {
    amount_re: Regex,
    total_amount_re: Regex,
    currency_re: Regex,
    hash_re: Regex,
    supported_currencies: Vec<String>,
    max_transaction_amount: Decimal,
}

impl LedgerValidator {
    /// Build a validator from the ledger configuration.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            amount_re: Regex::new(r"^-?\d+(\.\d{1,2})?$").expect("static regex"),
            total_amount_re: Regex::new(r"^\d+(\.\d{1,2})?$").expect("static regex"),
            currency_re: Regex::new(r"^[A-Z]{3}$").expect("static regex"),
            hash_re: Regex::new(r"^[a-f0-9]{64}$").expect("static regex"),
            supported_currencies: config.supported_currencies.clone(),
            max_transaction_amount: config.max_transaction_amount,
        }
    }

    /// Validate a single ledger entry.
    pub fn validate_entry(&self, entry: &Entry) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Structural
        if entry.id.get_version_num() != 4 {
            result.error(format!("id is not a UUIDv4: {}", entry.id));
        }
        if !self.amount_re.is_match(&fixed2(entry.amount)) {
            result.error(format!("malformed amount: {}", entry.amount));
        }
        if !self.currency_re.is_match(&entry.currency) {
            result.error(format!("malformed currency code: {}", entry.currency));
        }
        if !self.hash_re.is_match(&entry.hash) {
            result.error("hash is not 64 lowercase hex characters".to_string());
        }
        if let Some(previous) = &entry.previous_hash {
            if !self.hash_re.is_match(previous) {
                result.error("previousHash is not 64 lowercase hex characters".to_string());
            }
        }
        if entry.description.len() > MAX_ENTRY_DESCRIPTION {
            result.error(format!(
                "description exceeds {} characters",
                MAX_ENTRY_DESCRIPTION
            ));
        }

        // Business
        if entry.amount <= Decimal::ZERO {
            result.error("amount must be positive".to_string());
        }
        if entry.amount > self.max_transaction_amount {
            result.error(format!(
                "amount {} exceeds maximum {}",
                fixed2(entry.amount),
                fixed2(self.max_transaction_amount)
            ));
        }
        if !self.supported_currencies.contains(&entry.currency) {
            result.warning(format!("currency {} is not supported", entry.currency));
        }

        result
    }

    /// Validate a transaction together with its resolved entries.
    pub fn validate_transaction(&self, tx: &Transaction, entries: &[Entry]) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Structural
        if tx.id.get_version_num() != 4 {
            result.error(format!("id is not a UUIDv4: {}", tx.id));
        }
        if entries.len() < 2 {
            result.error(format!(
                "transaction requires at least 2 entries, has {}",
                entries.len()
            ));
        }
        if !(1..=10).contains(&tx.required_signatures) {
            result.error(format!(
                "requiredSignatures must be in 1..=10, got {}",
                tx.required_signatures
            ));
        }
        if !self.total_amount_re.is_match(&fixed2(tx.total_amount)) {
            result.error(format!("malformed totalAmount: {}", tx.total_amount));
        }
        if tx.description.len() > MAX_TRANSACTION_DESCRIPTION {
            result.error(format!(
                "description exceeds {} characters",
                MAX_TRANSACTION_DESCRIPTION
            ));
        }

        // Per-entry checks, prefixed with the entry id
        for entry in entries {
            let entry_result = self.validate_entry(entry);
            result.absorb_prefixed(&entry.id.to_string(), entry_result);
        }

        // Currency uniformity
        for entry in entries {
            if entry.currency != tx.currency {
                result.error(format!(
                    "{}: currency {} differs from transaction currency {}",
                    entry.id, entry.currency, tx.currency
                ));
            }
        }

        // Balance: CREDIT adds, everything else subtracts
        let net: Decimal = entries.iter().map(Entry::signed_amount).sum();
        if net.abs() > balance_tolerance() {
            result.error(format!("entries do not balance: net {}", fixed2(net.abs())));
        }

        // totalAmount consistency
        let credit_sum: Decimal = entries
            .iter()
            .filter(|e| e.entry_type == crate::types::EntryType::Credit)
            .map(|e| e.amount)
            .sum();
        if fixed2(credit_sum) != fixed2(tx.total_amount) {
            result.error(format!(
                "totalAmount {} does not match credit sum {}",
                fixed2(tx.total_amount),
                fixed2(credit_sum)
            ));
        }

        // Over-signing is suspicious but not fatal
        if tx.received_signatures.len() > tx.required_signatures as usize {
            result.warning(format!(
                "received {} signatures, only {} required",
                tx.received_signatures.len(),
                tx.required_signatures
            ));
        }

        result
    }

    /// Evaluate a policy overlay on a transaction.
    pub fn validate_against_policies(
        &self,
        tx: &Transaction,
        entries: &[Entry],
        rules: &PolicyRules,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !rules.allowed_transaction_types.is_empty()
            && !rules.allowed_transaction_types.contains(&tx.transaction_type)
        {
            result.error(format!(
                "policy {} does not allow {} transactions",
                rules.policy_id, tx.transaction_type
            ));
        }

        if let Some(max) = rules.max_amount {
            if tx.total_amount > max {
                result.error(format!(
                    "policy {} caps amount at {}, transaction totals {}",
                    rules.policy_id,
                    fixed2(max),
                    fixed2(tx.total_amount)
                ));
            }
        }

        if let Some((start, end)) = rules.business_hours {
            let hour = tx.timestamp.hour();
            if hour < start || hour > end {
                result.warning(format!(
                    "transaction created outside business hours {:02}:00-{:02}:59",
                    start, end
                ));
            }
        }

        for entry in entries {
            if entry.account.account_type == crate::types::AccountType::Beneficiary
                && rules.blocked_beneficiaries.contains(&entry.account.id)
            {
                result.error(format!(
                    "beneficiary {} is blocked by policy {}",
                    entry.account.id, rules.policy_id
                ));
            }
        }

        result
    }
}
