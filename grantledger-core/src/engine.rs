//! Main ledger orchestration layer
//!
//! Ties the entry store, validator, assembler, approval machine, balance
//! index, sink and oracle into a single engine value. The engine itself is
//! not thread-safe; host it behind the actor in [`crate::actor`] (or any
//! other serializing wrapper) so that all mutations observe a total order.

use crate::approval;
use crate::assembler::TransactionAssembler;
use crate::balance::BalanceIndex;
use crate::config::LedgerConfig;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::oracle::{SignatureOracle, StructuralOracle};
use crate::sink::{fallback_record, BlockchainSink, MockChainSink};
use crate::store::{EntryDraft, EntryStore};
use crate::types::{
    Balance, Entry, EntryStatus, SignatureType, Transaction, TransactionStatus, TransactionType,
};
use crate::validation::{LedgerValidator, PolicyRules};
use crate::verify::{self, IntegrityReport};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// The in-process grant ledger engine
pub struct Ledger {
    config: LedgerConfig,
    store: EntryStore,
    transactions: HashMap<Uuid, Transaction>,
    policies: HashMap<String, PolicyRules>,
    balances: BalanceIndex,
    validator: LedgerValidator,
    assembler: TransactionAssembler,
    sink: Arc<dyn BlockchainSink>,
    oracle: Arc<dyn SignatureOracle>,
    metrics: Metrics,
    cancel: CancellationToken,
}

impl Ledger {
    /// Create an engine with the mock sink and structural oracle.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let validator = LedgerValidator::new(&config);
        let assembler = TransactionAssembler::new(&config);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to create metrics: {}", e)))?;
        tracing::info!(
            required_signatures = config.required_signatures,
            multi_signature = config.enable_multi_signature,
            "ledger engine created"
        );
        Ok(Self {
            config,
            store: EntryStore::new(),
            transactions: HashMap::new(),
            policies: HashMap::new(),
            balances: BalanceIndex::new(),
            validator,
            assembler,
            sink: Arc::new(MockChainSink::default()),
            oracle: Arc::new(StructuralOracle),
            metrics,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the blockchain sink.
    pub fn with_sink(mut self, sink: Arc<dyn BlockchainSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the signature oracle.
    pub fn with_oracle(mut self, oracle: Arc<dyn SignatureOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Token that cooperatively cancels in-flight operations; checked
    /// before each suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Engine configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Metrics collector.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Register a policy so `create_transaction` can resolve it by id.
    pub fn register_policy(&mut self, rules: PolicyRules) {
        self.policies.insert(rules.policy_id.clone(), rules);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Concurrency("operation cancelled".to_string()));
        }
        Ok(())
    }

    /// Assemble and store a balanced transaction in DRAFT state.
    ///
    /// Entries are chained onto the log only after validation (and the
    /// policy overlay, when `policy_id` resolves) passes.
    pub async fn create_transaction(
        &mut self,
        grant_cycle_id: &str,
        transaction_type: TransactionType,
        mut drafts: Vec<EntryDraft>,
        description: &str,
        policy_id: Option<String>,
    ) -> Result<Transaction> {
        self.check_cancelled()?;

        if !self.config.enable_zk_proofs {
            for draft in &mut drafts {
                if draft.zk_proof.take().is_some() {
                    tracing::warn!("zk proofs disabled; dropping proof descriptor");
                }
            }
        }

        let policy = policy_id.as_ref().and_then(|id| self.policies.get(id));
        let tx = self.assembler.assemble(
            &mut self.store,
            &self.validator,
            grant_cycle_id,
            transaction_type,
            drafts,
            description,
            policy_id,
            policy,
        )?;

        self.metrics.record_transaction(tx.entries.len());
        tracing::info!(
            transaction_id = %tx.id,
            grant_cycle_id,
            transaction_type = %transaction_type,
            "transaction created"
        );
        self.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    /// Move a DRAFT transaction to PENDING_APPROVAL after re-validation.
    pub fn submit_for_approval(&mut self, transaction_id: Uuid, actor: &str) -> Result<Transaction> {
        let tx = self.transactions.get(&transaction_id).ok_or_else(|| Error::NotFound {
            kind: "transaction",
            id: transaction_id.to_string(),
        })?;
        approval::ensure_transition(tx.status, TransactionStatus::PendingApproval)?;

        let entries = self.store.by_transaction(transaction_id);
        let result = self.validator.validate_transaction(tx, &entries);
        if !result.valid() {
            return Err(Error::ValidationFailed(result.errors));
        }

        let tx = self
            .transactions
            .get_mut(&transaction_id)
            .expect("checked above");
        approval::apply_transition(tx, TransactionStatus::PendingApproval, actor, None)?;
        Ok(tx.clone())
    }

    /// Record a signature on a transaction and all of its entries.
    ///
    /// A DRAFT transaction is submitted for approval first, so signing is
    /// enough to start the workflow. Reaching the threshold promotes the
    /// transaction to APPROVED.
    pub async fn add_signature(
        &mut self,
        transaction_id: Uuid,
        signer: &str,
        signature: &str,
        signature_type: SignatureType,
    ) -> Result<Transaction> {
        self.check_cancelled()?;

        let status = self
            .transactions
            .get(&transaction_id)
            .ok_or_else(|| Error::NotFound {
                kind: "transaction",
                id: transaction_id.to_string(),
            })?
            .status;
        if status == TransactionStatus::Draft {
            self.submit_for_approval(transaction_id, "system")?;
        }

        let tx = self
            .transactions
            .get_mut(&transaction_id)
            .expect("checked above");
        let (record, outcome) = approval::record_signature(tx, signer, signature, signature_type)?;
        let entry_ids = tx.entries.clone();
        let tx_id = tx.id;

        for entry_id in entry_ids {
            self.store.add_signature(entry_id, record.clone())?;
        }
        self.metrics.record_signature();

        if outcome.approved {
            tracing::info!(transaction_id = %tx_id, "signature threshold reached");
        }
        Ok(self.transactions[&transaction_id].clone())
    }

    /// Execute an APPROVED transaction: submit to the sink, verify the
    /// returned hash, confirm entries and update balances exactly once.
    ///
    /// A sink or verification failure moves the transaction to REJECTED
    /// with the failure recorded in the audit trail; the engine never
    /// retries.
    pub async fn execute_transaction(
        &mut self,
        transaction_id: Uuid,
        actor: &str,
    ) -> Result<Transaction> {
        {
            let tx = self.transactions.get(&transaction_id).ok_or_else(|| Error::NotFound {
                kind: "transaction",
                id: transaction_id.to_string(),
            })?;
            approval::ensure_transition(tx.status, TransactionStatus::Executed)?;
        }

        self.check_cancelled()?;
        let entries = self.store.by_transaction(transaction_id);
        let sink = Arc::clone(&self.sink);

        let submitted = {
            let tx = &self.transactions[&transaction_id];
            sink.submit(tx, &entries).await
        };
        let tx_hash = match submitted {
            Ok(hash) => hash,
            Err(e) => {
                let message = e.to_string();
                self.reject_on_sink_failure(transaction_id, actor, &message);
                return Err(Error::SinkFailure(message));
            }
        };

        let verified = match sink.verify(&tx_hash).await {
            Ok(v) => v,
            Err(e) => {
                let message = e.to_string();
                self.reject_on_sink_failure(transaction_id, actor, &message);
                return Err(Error::SinkFailure(message));
            }
        };
        if !verified {
            let message = format!("submission {} did not verify", tx_hash);
            self.reject_on_sink_failure(transaction_id, actor, &message);
            return Err(Error::SinkFailure(message));
        }

        let record = match sink.metadata(&tx_hash).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(transaction_id = %transaction_id, error = %e, "sink metadata unavailable");
                fallback_record("unknown", &tx_hash)
            }
        };

        // Past this point execution wins any cancellation race.
        for entry in &entries {
            self.store.set_status(entry.id, EntryStatus::Confirmed)?;
        }
        let confirmed = self.store.by_transaction(transaction_id);
        self.balances.apply_execution(&confirmed);

        let tx = self
            .transactions
            .get_mut(&transaction_id)
            .expect("checked above");
        tx.execution_timestamp = Some(Utc::now());
        tx.blockchain = Some(record);
        approval::apply_transition(tx, TransactionStatus::Executed, actor, None)?;
        self.metrics.record_execution();
        tracing::info!(transaction_id = %transaction_id, tx_hash = %tx_hash, "transaction executed");
        Ok(tx.clone())
    }

    fn reject_on_sink_failure(&mut self, transaction_id: Uuid, actor: &str, message: &str) {
        tracing::error!(transaction_id = %transaction_id, error = message, "sink failure");
        if let Some(tx) = self.transactions.get_mut(&transaction_id) {
            let _ = approval::apply_transition(
                tx,
                TransactionStatus::Rejected,
                actor,
                Some(message.to_string()),
            );
            self.metrics.record_rejection();
        }
    }

    /// Reject a non-terminal transaction, recording the reason.
    pub fn reject_transaction(
        &mut self,
        transaction_id: Uuid,
        reason: Option<String>,
        actor: &str,
    ) -> Result<Transaction> {
        let tx = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| Error::NotFound {
                kind: "transaction",
                id: transaction_id.to_string(),
            })?;
        approval::apply_transition(tx, TransactionStatus::Rejected, actor, reason)?;
        self.metrics.record_rejection();
        Ok(tx.clone())
    }

    /// Cancel a transaction from the processing queue.
    ///
    /// Returns `true` when a ledger transaction was cancelled. A missing
    /// transaction is non-fatal (the queue-level cancellation still
    /// succeeds) and a terminal transaction degrades to a no-op, both
    /// returning `false`.
    pub fn cancel_transaction(
        &mut self,
        transaction_id: Uuid,
        reason: Option<String>,
        actor: &str,
    ) -> bool {
        match self.transactions.get_mut(&transaction_id) {
            None => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    "cancellation for transaction not in ledger"
                );
                false
            }
            Some(tx) if tx.is_terminal() => false,
            Some(tx) => {
                approval::apply_transition(tx, TransactionStatus::Cancelled, actor, reason)
                    .expect("non-terminal transactions can always cancel");
                true
            }
        }
    }

    /// Drive a transaction toward the requested status.
    ///
    /// Dispatches to submit, execute, reject or cancel; DRAFT and APPROVED
    /// cannot be requested directly (approval only happens through
    /// signatures).
    pub async fn update_transaction_status(
        &mut self,
        transaction_id: Uuid,
        status: TransactionStatus,
        actor: &str,
    ) -> Result<Transaction> {
        match status {
            TransactionStatus::PendingApproval => self.submit_for_approval(transaction_id, actor),
            TransactionStatus::Executed => self.execute_transaction(transaction_id, actor).await,
            TransactionStatus::Rejected => self.reject_transaction(transaction_id, None, actor),
            TransactionStatus::Cancelled => {
                if self.cancel_transaction(transaction_id, None, actor) {
                    Ok(self.transactions[&transaction_id].clone())
                } else {
                    let from = self
                        .transactions
                        .get(&transaction_id)
                        .map(|tx| tx.status)
                        .ok_or_else(|| Error::NotFound {
                            kind: "transaction",
                            id: transaction_id.to_string(),
                        })?;
                    Err(Error::IllegalTransactionTransition {
                        from,
                        to: TransactionStatus::Cancelled,
                    })
                }
            }
            other => {
                let from = self
                    .transactions
                    .get(&transaction_id)
                    .map(|tx| tx.status)
                    .ok_or_else(|| Error::NotFound {
                        kind: "transaction",
                        id: transaction_id.to_string(),
                    })?;
                Err(Error::IllegalTransactionTransition { from, to: other })
            }
        }
    }

    /// Look up a transaction.
    pub fn get_transaction(&self, transaction_id: Uuid) -> Option<Transaction> {
        self.transactions.get(&transaction_id).cloned()
    }

    /// Look up an entry.
    pub fn get_entry(&self, entry_id: Uuid) -> Option<Entry> {
        self.store.get(entry_id).cloned()
    }

    /// Entries of a transaction, timestamp ascending.
    pub fn transaction_entries(&self, transaction_id: Uuid) -> Vec<Entry> {
        self.store.by_transaction(transaction_id)
    }

    /// Transaction ids seen in a grant cycle.
    pub fn grant_cycle_transactions(&self, grant_cycle_id: &str) -> Vec<Uuid> {
        self.store.by_grant_cycle(grant_cycle_id)
    }

    /// Balance for an account/currency pair; derives and memoizes on miss.
    pub fn get_account_balance(&self, account_id: &str, currency: &str) -> Balance {
        self.balances
            .get_account_balance(&self.store, account_id, currency)
    }

    /// Drop all cached balances; subsequent reads re-derive from entries.
    pub fn clear_balance_index(&self) {
        self.balances.clear();
    }

    /// Hash of the most recently appended entry.
    pub fn chain_tip(&self) -> Option<String> {
        self.store.tip().map(String::from)
    }

    /// Number of entries in the log.
    pub fn entry_count(&self) -> usize {
        self.store.len()
    }

    /// Number of transactions known to the engine.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Run a full integrity sweep over a consistent snapshot.
    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        self.check_cancelled()?;
        let entries = self.store.time_ordered();
        let transactions: Vec<Transaction> = self.transactions.values().cloned().collect();
        let report = verify::sweep(&entries, &transactions, self.oracle.as_ref()).await?;
        self.metrics.record_integrity_sweep();
        Ok(report)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("entries", &self.store.len())
            .field("transactions", &self.transactions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, AccountOwner, AccountType, EntryType, OwnerType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn account(id: &str, account_type: AccountType) -> Account {
        Account {
            id: id.to_string(),
            account_type,
            owner: AccountOwner {
                id: "org-1".to_string(),
                owner_type: OwnerType::Organization,
                name: None,
            },
        }
    }

    fn allocation_drafts(amount: Decimal) -> Vec<EntryDraft> {
        vec![
            EntryDraft::new(
                account("funding", AccountType::Funding),
                amount,
                "USD",
                EntryType::Debit,
                "allocation out of funding",
            ),
            EntryDraft::new(
                account("disbursement", AccountType::Disbursement),
                amount,
                "USD",
                EntryType::Credit,
                "allocation into disbursement",
            ),
        ]
    }

    async fn ledger() -> Ledger {
        Ledger::new(LedgerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_transaction_draft() {
        let mut ledger = ledger().await;
        let tx = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(5000.00)),
                "Q1 allocation",
                None,
            )
            .await
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Draft);
        assert_eq!(ledger.entry_count(), 2);
        assert_eq!(ledger.transaction_count(), 1);
        assert!(ledger.chain_tip().is_some());
    }

    #[tokio::test]
    async fn test_signature_workflow_promotes() {
        let mut ledger = ledger().await;
        let tx = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(100.00)),
                "allocation",
                None,
            )
            .await
            .unwrap();

        let tx = ledger
            .add_signature(tx.id, "signer-A", "aa11", SignatureType::EdDsa)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::PendingApproval);

        let err = ledger
            .add_signature(tx.id, "signer-A", "aa11", SignatureType::EdDsa)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateSigner(_)));

        let tx = ledger
            .add_signature(tx.id, "signer-B", "bb22", SignatureType::Ecdsa)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Approved);

        // Signatures fanned out to every child entry.
        for entry in ledger.transaction_entries(tx.id) {
            assert_eq!(entry.signatures.len(), 2);
            assert_eq!(entry.signatures[0].signer, "signer-A");
        }
    }

    #[tokio::test]
    async fn test_execution_confirms_and_updates_balances() {
        let mut ledger = ledger().await;
        let tx = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(5000.00)),
                "allocation",
                None,
            )
            .await
            .unwrap();
        ledger
            .add_signature(tx.id, "signer-A", "aa", SignatureType::EdDsa)
            .await
            .unwrap();
        ledger
            .add_signature(tx.id, "signer-B", "bb", SignatureType::EdDsa)
            .await
            .unwrap();

        let executed = ledger
            .update_transaction_status(tx.id, TransactionStatus::Executed, "test")
            .await
            .unwrap();

        assert_eq!(executed.status, TransactionStatus::Executed);
        assert!(executed.execution_timestamp.is_some());
        assert!(executed.blockchain.is_some());
        for entry in ledger.transaction_entries(tx.id) {
            assert_eq!(entry.status, EntryStatus::Confirmed);
        }
        assert_eq!(
            ledger.get_account_balance("funding", "USD").balance,
            dec!(-5000.00)
        );
        assert_eq!(
            ledger.get_account_balance("disbursement", "USD").balance,
            dec!(5000.00)
        );
    }

    #[tokio::test]
    async fn test_sink_failure_rejects() {
        let sink = Arc::new(MockChainSink::default());
        sink.set_healthy(false);
        let mut ledger = Ledger::new(LedgerConfig::default())
            .unwrap()
            .with_sink(sink.clone());

        let tx = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(10.00)),
                "allocation",
                None,
            )
            .await
            .unwrap();
        ledger
            .add_signature(tx.id, "signer-A", "aa", SignatureType::EdDsa)
            .await
            .unwrap();
        ledger
            .add_signature(tx.id, "signer-B", "bb", SignatureType::EdDsa)
            .await
            .unwrap();

        let err = ledger.execute_transaction(tx.id, "test").await.unwrap_err();
        assert!(matches!(err, Error::SinkFailure(_)));

        let rejected = ledger.get_transaction(tx.id).unwrap();
        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert!(rejected
            .audit_trail
            .iter()
            .any(|r| r.action == "STATUS_CHANGE_REJECTED" && r.details.is_some()));
        // Entries stay unconfirmed; balances untouched.
        assert_eq!(
            ledger.get_account_balance("funding", "USD").balance,
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_cancel_semantics() {
        let mut ledger = ledger().await;

        // Unknown transaction: non-fatal, returns false.
        assert!(!ledger.cancel_transaction(Uuid::new_v4(), None, "ops"));

        let tx = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(10.00)),
                "allocation",
                None,
            )
            .await
            .unwrap();
        assert!(ledger.cancel_transaction(tx.id, Some("duplicate".to_string()), "ops"));
        assert_eq!(
            ledger.get_transaction(tx.id).unwrap().status,
            TransactionStatus::Cancelled
        );

        // Cancelling a terminal transaction degrades to a no-op.
        assert!(!ledger.cancel_transaction(tx.id, None, "ops"));
    }

    #[tokio::test]
    async fn test_policy_overlay_blocks_creation() {
        let mut ledger = ledger().await;
        ledger.register_policy(PolicyRules {
            policy_id: "policy-1".to_string(),
            allowed_transaction_types: vec![TransactionType::Disbursement],
            max_amount: None,
            business_hours: None,
            blocked_beneficiaries: vec![],
        });

        let err = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(10.00)),
                "allocation",
                Some("policy-1".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed(_)));
        assert_eq!(ledger.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_verify_integrity_clean() {
        let mut ledger = ledger().await;
        ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(10.00)),
                "allocation",
                None,
            )
            .await
            .unwrap();

        let report = ledger.verify_integrity().await.unwrap();
        assert!(report.valid(), "unexpected: {:?}", report.errors);
    }

    #[tokio::test]
    async fn test_cancellation_token_stops_new_work() {
        let mut ledger = ledger().await;
        ledger.cancellation_token().cancel();

        let err = ledger
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                allocation_drafts(dec!(10.00)),
                "allocation",
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Concurrency(_)));
    }
}
