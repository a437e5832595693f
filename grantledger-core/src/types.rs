//! Core types for the grant ledger
//!
//! All types serialize to the canonical wire shape: camelCase field names,
//! SCREAMING enum spellings, amounts as fixed-point two-digit strings.
//! The wire shape doubles as the hashing payload, so field names and enum
//! spellings must never drift.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Render a decimal as a fixed-point string with exactly two fractional
/// digits, truncating anything beyond the second digit.
pub fn fixed2(value: Decimal) -> String {
    let mut v = value.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    v.rescale(2);
    v.to_string()
}

/// Serde adapter for amounts: two-digit fixed-point strings on the wire.
pub(crate) mod amount_string {
    use super::fixed2;
    use rust_decimal::Decimal;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&fixed2(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Decimal::from_str(&raw).map_err(de::Error::custom)
    }
}

/// Ledger account classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Source of grant funds
    Funding,
    /// Outbound disbursement pool
    Disbursement,
    /// Final recipient account
    Beneficiary,
    /// Overhead and operations
    Administrative,
    /// Held-back reserve
    Reserve,
}

/// Legal nature of an account owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    /// Registered organization
    Organization,
    /// Natural person
    Individual,
    /// Automated system account
    System,
}

/// Party that owns an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOwner {
    /// Owner identifier
    pub id: String,
    /// Owner classification
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
    /// Display name, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Account referenced by a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: String,
    /// Account classification
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Owning party
    pub owner: AccountOwner,
}

/// Direction of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Value flowing out of an account
    Debit,
    /// Value flowing into an account
    Credit,
    /// Correction entry; balances as a debit
    Adjustment,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
            EntryType::Adjustment => "ADJUSTMENT",
        };
        write!(f, "{}", s)
    }
}

/// Entry lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Created, not yet part of an executed transaction
    Pending,
    /// Parent transaction executed; entry is immutable
    Confirmed,
    /// Parent transaction rejected
    Rejected,
    /// Parent transaction cancelled
    Cancelled,
}

impl EntryStatus {
    /// CONFIRMED, REJECTED and CANCELLED are terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Confirmed => "CONFIRMED",
            EntryStatus::Rejected => "REJECTED",
            EntryStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// Signature scheme declared by a signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    /// ECDSA over secp256k1 or P-256
    #[serde(rename = "ECDSA")]
    Ecdsa,
    /// Ed25519 family
    #[serde(rename = "EdDSA")]
    EdDsa,
    /// RSA PKCS#1 / PSS
    #[serde(rename = "RSA")]
    Rsa,
}

/// A signature attached to an entry; arrival order is preserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySignature {
    /// Signer identity
    pub signer: String,
    /// Opaque signature material
    pub signature: String,
    /// Time the signature was collected
    pub timestamp: DateTime<Utc>,
    /// Declared scheme
    pub signature_type: SignatureType,
}

/// Zero-knowledge proof descriptor carried opaquely on an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProofRef {
    /// Proof system identifier
    pub protocol: String,
    /// Encoded proof blob
    pub proof: String,
    /// Public inputs, in circuit order
    pub public_signals: Vec<String>,
}

/// A single atomic credit/debit record, the unit of the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Random 128-bit identifier (UUIDv4)
    pub id: Uuid,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Grant cycle this entry belongs to
    pub grant_cycle_id: String,
    /// Owning transaction (weak back-reference)
    pub transaction_id: Uuid,
    /// Affected account
    pub account: Account,
    /// Non-negative magnitude, two-digit fixed point
    #[serde(with = "amount_string")]
    pub amount: Decimal,
    /// ISO 4217 currency code
    pub currency: String,
    /// Direction
    pub entry_type: EntryType,
    /// Human-readable description
    pub description: String,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Chain tip at creation time; absent only for the first entry ever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    /// SHA-256 of the canonical payload, lowercase hex
    pub hash: String,
    /// Collected signatures, arrival order
    pub signatures: Vec<EntrySignature>,
    /// Optional proof descriptor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zk_proof: Option<ZkProofRef>,
    /// Lifecycle status
    pub status: EntryStatus,
}

impl Entry {
    /// Signed contribution of this entry to a balance: CREDIT adds, every
    /// other type (including ADJUSTMENT) subtracts.
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Credit => self.amount,
            _ => -self.amount,
        }
    }
}

/// Economic intent of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Funds allocated into a cycle
    Allocation,
    /// Funds paid out to beneficiaries
    Disbursement,
    /// Unspent funds returned
    Return,
    /// Manual correction
    Adjustment,
    /// Cycle close-out
    Closure,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Allocation => "ALLOCATION",
            TransactionType::Disbursement => "DISBURSEMENT",
            TransactionType::Return => "RETURN",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Closure => "CLOSURE",
        };
        write!(f, "{}", s)
    }
}

/// Transaction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Assembled, not yet submitted
    Draft,
    /// Awaiting signatures
    PendingApproval,
    /// Signature threshold reached
    Approved,
    /// Submitted to the chain sink and confirmed (terminal)
    Executed,
    /// Rejected by validation, sink, or operator (terminal)
    Rejected,
    /// Cancelled before execution (terminal)
    Cancelled,
}

impl TransactionStatus {
    /// EXECUTED, REJECTED and CANCELLED are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Executed | TransactionStatus::Rejected | TransactionStatus::Cancelled
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Draft => "DRAFT",
            TransactionStatus::PendingApproval => "PENDING_APPROVAL",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Executed => "EXECUTED",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{}", s)
    }
}

/// One line of a transaction's append-only audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// When the action happened
    pub timestamp: DateTime<Utc>,
    /// Action tag, e.g. `STATUS_CHANGE_APPROVED`
    pub action: String,
    /// Who triggered it
    pub actor: String,
    /// Optional free-form detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Metadata returned by the blockchain sink after submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainRecord {
    /// Chain identifier
    pub blockchain: String,
    /// Chain-side transaction hash
    pub tx_hash: String,
    /// Block height, once mined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Gas consumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Confirmation count at query time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u32>,
}

/// A balanced bundle of entries representing one economic event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction identifier
    pub id: Uuid,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Grant cycle this transaction belongs to
    pub grant_cycle_id: String,
    /// Economic intent
    pub transaction_type: TransactionType,
    /// Human-readable description
    pub description: String,
    /// Child entry ids, creation order; records live in the entry store
    pub entries: Vec<Uuid>,
    /// Sum of CREDIT entry magnitudes
    #[serde(with = "amount_string")]
    pub total_amount: Decimal,
    /// Currency common to all entries
    pub currency: String,
    /// Governing policy, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    /// Signature threshold (1..=10)
    pub required_signatures: u8,
    /// Signer ids, arrival order, no duplicates
    pub received_signatures: Vec<String>,
    /// Lifecycle status
    pub status: TransactionStatus,
    /// Set on EXECUTED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_timestamp: Option<DateTime<Utc>>,
    /// Chain-side metadata, set on EXECUTED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain: Option<BlockchainRecord>,
    /// Append-only audit trail
    pub audit_trail: Vec<AuditRecord>,
}

impl Transaction {
    /// Whether the lifecycle can still advance.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append an audit record.
    pub fn audit(&mut self, action: impl Into<String>, actor: &str, details: Option<String>) {
        self.audit_trail.push(AuditRecord {
            timestamp: Utc::now(),
            action: action.into(),
            actor: actor.to_string(),
            details,
        });
    }
}

/// Derived account balance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Account identifier
    pub account_id: String,
    /// Signed two-digit fixed-point balance
    #[serde(with = "amount_string")]
    pub balance: Decimal,
    /// Currency
    pub currency: String,
    /// Time of last update or derivation
    pub as_of: DateTime<Utc>,
    /// Set by external audit, never by the core
    pub verified: bool,
}

/// Grant cycle lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    /// Accepting transactions
    Active,
    /// Closed to new transactions
    Closed,
    /// Retained for audit only
    Archived,
}

/// Time-bounded envelope grouping related transactions.
///
/// The core treats cycles as identifiers; lifecycle management lives
/// outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCycle {
    /// Cycle identifier
    pub id: String,
    /// Parent grant
    pub grant_id: String,
    /// Window start
    pub start_date: DateTime<Utc>,
    /// Window end
    pub end_date: DateTime<Utc>,
    /// Budget envelope
    #[serde(with = "amount_string")]
    pub total_amount: Decimal,
    /// Currency
    pub currency: String,
    /// Lifecycle status
    pub status: CycleStatus,
    /// Creator identity
    pub created_by: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}
