//! Error types for the grant ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction entries do not sum to zero
    #[error("entries do not balance: net {net}")]
    UnbalancedEntries {
        /// Absolute value of the signed entry sum
        net: Decimal,
    },

    /// Entries of one transaction carry different currencies
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency of the first entry
        expected: String,
        /// Offending currency
        found: String,
    },

    /// Validator rejected the entity; the full error list is preserved
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Entity lookup failed
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("transaction", "entry", ...)
        kind: &'static str,
        /// Offending identifier
        id: String,
    },

    /// Signer already present on the transaction
    #[error("duplicate signer: {0}")]
    DuplicateSigner(String),

    /// Entry status transition out of a terminal state
    #[error("illegal entry transition: {from} -> {to}")]
    IllegalEntryTransition {
        /// Current status
        from: crate::types::EntryStatus,
        /// Requested status
        to: crate::types::EntryStatus,
    },

    /// Transaction status transition not in the state machine
    #[error("illegal transaction transition: {from} -> {to}")]
    IllegalTransactionTransition {
        /// Current status
        from: crate::types::TransactionStatus,
        /// Requested status
        to: crate::types::TransactionStatus,
    },

    /// Amount negative or beyond the configured maximum
    #[error("amount out of range: {amount}")]
    AmountOutOfRange {
        /// Offending amount
        amount: Decimal,
    },

    /// Blockchain sink submission or verification failed
    #[error("sink failure: {0}")]
    SinkFailure(String),

    /// Integrity sweep found violations
    #[error("integrity violation: {}", .0.join("; "))]
    IntegrityViolation(Vec<String>),

    /// Actor mailbox or response channel closed
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
