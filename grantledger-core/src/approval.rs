//! Multi-signature approval state machine
//!
//! Pure transition logic over [`Transaction`] state. The engine owns the
//! side effects (sink submission, entry confirmation, balance updates);
//! this module decides which transitions are legal and keeps the audit
//! trail and signature bookkeeping consistent.
//!
//! ```text
//! DRAFT ──submit──▶ PENDING_APPROVAL ──threshold──▶ APPROVED ──execute──▶ EXECUTED
//!   │                     │                            │
//!   └──────────┬──────────┴──────────────┬─────────────┘
//!              ▼                         ▼
//!          CANCELLED                 REJECTED
//! ```

use crate::error::{Error, Result};
use crate::types::{EntrySignature, SignatureType, Transaction, TransactionStatus};
use chrono::Utc;

/// Whether the state machine permits `from -> to`.
pub fn transition_allowed(from: TransactionStatus, to: TransactionStatus) -> bool {
    use TransactionStatus::*;
    match (from, to) {
        (Draft, PendingApproval) => true,
        (PendingApproval, Approved) => true,
        (Approved, Executed) => true,
        // Terminal alternates are reachable from any non-terminal state.
        (from, Rejected | Cancelled) => !from.is_terminal(),
        _ => false,
    }
}

/// Check a transition, failing with [`Error::IllegalTransactionTransition`].
pub fn ensure_transition(from: TransactionStatus, to: TransactionStatus) -> Result<()> {
    if transition_allowed(from, to) {
        Ok(())
    } else {
        Err(Error::IllegalTransactionTransition { from, to })
    }
}

/// Apply a status transition, recording a `STATUS_CHANGE_<new>` audit line.
pub fn apply_transition(
    tx: &mut Transaction,
    to: TransactionStatus,
    actor: &str,
    details: Option<String>,
) -> Result<()> {
    ensure_transition(tx.status, to)?;
    tx.status = to;
    tx.audit(format!("STATUS_CHANGE_{}", to), actor, details);
    tracing::debug!(transaction_id = %tx.id, status = %to, "transaction transition");
    Ok(())
}

/// Outcome of recording one signature
#[derive(Debug, Clone, Copy)]
pub struct SignatureOutcome {
    /// True when this signature crossed the approval threshold
    pub approved: bool,
}

/// Record a signer on the transaction and build the signature record that
/// the engine fans out to every child entry.
///
/// The transaction must be in PENDING_APPROVAL. A repeated signer fails
/// with [`Error::DuplicateSigner`] and changes nothing.
pub fn record_signature(
    tx: &mut Transaction,
    signer: &str,
    signature: &str,
    signature_type: SignatureType,
) -> Result<(EntrySignature, SignatureOutcome)> {
    if tx.status != TransactionStatus::PendingApproval {
        return Err(Error::IllegalTransactionTransition {
            from: tx.status,
            to: TransactionStatus::Approved,
        });
    }
    if tx.received_signatures.iter().any(|s| s == signer) {
        return Err(Error::DuplicateSigner(signer.to_string()));
    }

    tx.received_signatures.push(signer.to_string());
    tx.audit("SIGNATURE_ADDED", signer, None);

    let record = EntrySignature {
        signer: signer.to_string(),
        signature: signature.to_string(),
        timestamp: Utc::now(),
        signature_type,
    };

    let approved = tx.received_signatures.len() >= tx.required_signatures as usize;
    if approved {
        tx.audit("ALL_SIGNATURES_RECEIVED", "system", None);
        apply_transition(tx, TransactionStatus::Approved, "system", None)?;
    }

    Ok((record, SignatureOutcome { approved }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionType;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn pending_tx(required: u8) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            grant_cycle_id: "cycle-1".to_string(),
            transaction_type: TransactionType::Allocation,
            description: "test".to_string(),
            entries: vec![],
            total_amount: dec!(100.00),
            currency: "USD".to_string(),
            policy_id: None,
            required_signatures: required,
            received_signatures: vec![],
            status: TransactionStatus::PendingApproval,
            execution_timestamp: None,
            blockchain: None,
            audit_trail: vec![],
        }
    }

    #[test]
    fn test_transition_table() {
        use TransactionStatus::*;
        assert!(transition_allowed(Draft, PendingApproval));
        assert!(transition_allowed(PendingApproval, Approved));
        assert!(transition_allowed(Approved, Executed));
        assert!(transition_allowed(Approved, Rejected));
        assert!(transition_allowed(Draft, Cancelled));
        assert!(transition_allowed(PendingApproval, Rejected));

        assert!(!transition_allowed(Draft, Approved));
        assert!(!transition_allowed(PendingApproval, Executed));
        assert!(!transition_allowed(Executed, Cancelled));
        assert!(!transition_allowed(Rejected, PendingApproval));
        assert!(!transition_allowed(Cancelled, Rejected));
    }

    #[test]
    fn test_apply_transition_appends_audit() {
        let mut tx = pending_tx(2);
        tx.status = TransactionStatus::Draft;
        apply_transition(&mut tx, TransactionStatus::PendingApproval, "system", None).unwrap();
        assert_eq!(tx.status, TransactionStatus::PendingApproval);
        assert_eq!(
            tx.audit_trail.last().unwrap().action,
            "STATUS_CHANGE_PENDING_APPROVAL"
        );
    }

    #[test]
    fn test_signatures_promote_at_threshold() {
        let mut tx = pending_tx(2);

        let (_, outcome) =
            record_signature(&mut tx, "signer-A", "aa11", SignatureType::EdDsa).unwrap();
        assert!(!outcome.approved);
        assert_eq!(tx.status, TransactionStatus::PendingApproval);
        assert_eq!(tx.received_signatures, vec!["signer-A"]);

        let (_, outcome) =
            record_signature(&mut tx, "signer-B", "bb22", SignatureType::Ecdsa).unwrap();
        assert!(outcome.approved);
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert!(tx
            .audit_trail
            .iter()
            .any(|r| r.action == "ALL_SIGNATURES_RECEIVED"));
    }

    #[test]
    fn test_duplicate_signer_rejected() {
        let mut tx = pending_tx(2);
        record_signature(&mut tx, "signer-A", "aa11", SignatureType::EdDsa).unwrap();

        let err =
            record_signature(&mut tx, "signer-A", "aa22", SignatureType::EdDsa).unwrap_err();
        assert!(matches!(err, Error::DuplicateSigner(s) if s == "signer-A"));
        assert_eq!(tx.received_signatures.len(), 1);
    }

    #[test]
    fn test_signature_on_approved_fails() {
        let mut tx = pending_tx(1);
        record_signature(&mut tx, "signer-A", "aa11", SignatureType::EdDsa).unwrap();
        assert_eq!(tx.status, TransactionStatus::Approved);

        let err =
            record_signature(&mut tx, "signer-B", "bb22", SignatureType::EdDsa).unwrap_err();
        assert!(matches!(err, Error::IllegalTransactionTransition { .. }));
    }
}
