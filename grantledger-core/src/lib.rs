//! GrantLedger Core
//!
//! Append-only, cryptographically chained double-entry ledger for grant
//! disbursement.
//!
//! # Architecture
//!
//! - **Hash chain**: every entry links to its predecessor through
//!   `previousHash`; the entry hash is SHA-256 over a canonical JSON
//!   payload with sorted top-level keys
//! - **Double entry**: transactions bundle two or more entries whose
//!   credits and debits cancel out
//! - **Multi-signature approval**: transactions move DRAFT →
//!   PENDING_APPROVAL → APPROVED → EXECUTED, promoted by a configurable
//!   signature threshold
//! - **Single writer**: the engine is hosted behind one actor task, which
//!   serializes all mutations and keeps chain order total
//! - **Derived balances**: the balance index is a cache over CONFIRMED
//!   entries and can be rebuilt at any time
//!
//! # Invariants
//!
//! - Balanced transactions: credits minus debits is zero per transaction
//! - Hash correctness: stored hashes always re-derive from entry payloads
//! - Chain continuity: time-ordered entries link without gaps
//! - Executed implies confirmed: execution confirms every child entry and
//!   feeds the balance index exactly once
//!
//! # Example
//!
//! ```no_run
//! use grantledger_core::{
//!     spawn_ledger_actor, EntryDraft, Ledger, LedgerConfig, TransactionType,
//! };
//!
//! #[tokio::main]
//! async fn main() -> grantledger_core::Result<()> {
//!     let ledger = Ledger::new(LedgerConfig::default())?;
//!     let handle = spawn_ledger_actor(ledger);
//!
//!     // let tx = handle.create_transaction("cycle-1", TransactionType::Allocation,
//!     //     drafts, "Q1 allocation", None).await?;
//!
//!     handle.shutdown().await
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod approval;
pub mod assembler;
pub mod balance;
pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod oracle;
pub mod sink;
pub mod store;
pub mod types;
pub mod validation;
pub mod verify;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use config::LedgerConfig;
pub use engine::Ledger;
pub use error::{Error, Result};
pub use oracle::{SignatureOracle, StructuralOracle};
pub use sink::{BlockchainSink, MockChainSink};
pub use store::{EntryDraft, EntryStore};
pub use types::{
    Account, AccountOwner, AccountType, AuditRecord, Balance, BlockchainRecord, CycleStatus,
    Entry, EntrySignature, EntryStatus, EntryType, GrantCycle, OwnerType, SignatureType,
    Transaction, TransactionStatus, TransactionType, ZkProofRef,
};
pub use validation::{LedgerValidator, PolicyRules, ValidationResult};
pub use verify::IntegrityReport;
