//! Actor-based hosting for the ledger engine
//!
//! The engine is not thread-safe; this module hosts it on a single tokio
//! task and hands out a cloneable [`LedgerHandle`]. All mutations flow
//! through one bounded mailbox, which gives the chain a total order on
//! tip advancement for free: two concurrent assemblies are processed one
//! after the other, so entries of different transactions never interleave.

use crate::engine::Ledger;
use crate::error::{Error, Result};
use crate::store::EntryDraft;
use crate::types::{
    Balance, Entry, SignatureType, Transaction, TransactionStatus, TransactionType,
};
use crate::verify::IntegrityReport;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Assemble and store a transaction
    CreateTransaction {
        /// Grant cycle id
        grant_cycle_id: String,
        /// Economic intent
        transaction_type: TransactionType,
        /// Entry drafts
        drafts: Vec<EntryDraft>,
        /// Description
        description: String,
        /// Optional policy id
        policy_id: Option<String>,
        /// Reply channel
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Record a signature
    AddSignature {
        /// Transaction id
        transaction_id: Uuid,
        /// Signer identity
        signer: String,
        /// Signature material
        signature: String,
        /// Declared scheme
        signature_type: SignatureType,
        /// Reply channel
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Drive a transaction toward a status
    UpdateStatus {
        /// Transaction id
        transaction_id: Uuid,
        /// Requested status
        status: TransactionStatus,
        /// Acting identity
        actor: String,
        /// Reply channel
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Cancel a transaction (non-fatal when unknown)
    CancelTransaction {
        /// Transaction id
        transaction_id: Uuid,
        /// Optional reason
        reason: Option<String>,
        /// Acting identity
        actor: String,
        /// Reply channel
        response: oneshot::Sender<bool>,
    },

    /// Fetch a transaction
    GetTransaction {
        /// Transaction id
        transaction_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<Transaction>>,
    },

    /// Fetch an entry
    GetEntry {
        /// Entry id
        entry_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Result<Entry>>,
    },

    /// Entries of a transaction, timestamp ascending
    TransactionEntries {
        /// Transaction id
        transaction_id: Uuid,
        /// Reply channel
        response: oneshot::Sender<Vec<Entry>>,
    },

    /// Transaction ids of a grant cycle
    GrantCycleTransactions {
        /// Cycle id
        grant_cycle_id: String,
        /// Reply channel
        response: oneshot::Sender<Vec<Uuid>>,
    },

    /// Account balance
    GetBalance {
        /// Account id
        account_id: String,
        /// Currency
        currency: String,
        /// Reply channel
        response: oneshot::Sender<Balance>,
    },

    /// Full integrity sweep
    VerifyIntegrity {
        /// Reply channel
        response: oneshot::Sender<Result<IntegrityReport>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that serializes all engine access
#[derive(Debug)]
pub struct LedgerActor {
    ledger: Ledger,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create a new actor.
    pub fn new(ledger: Ledger, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop.
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                other => self.handle_message(other).await,
            }
        }
        tracing::info!("ledger actor stopped");
    }

    async fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::CreateTransaction {
                grant_cycle_id,
                transaction_type,
                drafts,
                description,
                policy_id,
                response,
            } => {
                let result = self
                    .ledger
                    .create_transaction(
                        &grant_cycle_id,
                        transaction_type,
                        drafts,
                        &description,
                        policy_id,
                    )
                    .await;
                let _ = response.send(result);
            }

            LedgerMessage::AddSignature {
                transaction_id,
                signer,
                signature,
                signature_type,
                response,
            } => {
                let result = self
                    .ledger
                    .add_signature(transaction_id, &signer, &signature, signature_type)
                    .await;
                let _ = response.send(result);
            }

            LedgerMessage::UpdateStatus {
                transaction_id,
                status,
                actor,
                response,
            } => {
                let result = self
                    .ledger
                    .update_transaction_status(transaction_id, status, &actor)
                    .await;
                let _ = response.send(result);
            }

            LedgerMessage::CancelTransaction {
                transaction_id,
                reason,
                actor,
                response,
            } => {
                let cancelled = self.ledger.cancel_transaction(transaction_id, reason, &actor);
                let _ = response.send(cancelled);
            }

            LedgerMessage::GetTransaction {
                transaction_id,
                response,
            } => {
                let result = self
                    .ledger
                    .get_transaction(transaction_id)
                    .ok_or_else(|| Error::NotFound {
                        kind: "transaction",
                        id: transaction_id.to_string(),
                    });
                let _ = response.send(result);
            }

            LedgerMessage::GetEntry { entry_id, response } => {
                let result = self.ledger.get_entry(entry_id).ok_or_else(|| Error::NotFound {
                    kind: "entry",
                    id: entry_id.to_string(),
                });
                let _ = response.send(result);
            }

            LedgerMessage::TransactionEntries {
                transaction_id,
                response,
            } => {
                let _ = response.send(self.ledger.transaction_entries(transaction_id));
            }

            LedgerMessage::GrantCycleTransactions {
                grant_cycle_id,
                response,
            } => {
                let _ = response.send(self.ledger.grant_cycle_transactions(&grant_cycle_id));
            }

            LedgerMessage::GetBalance {
                account_id,
                currency,
                response,
            } => {
                let _ = response.send(self.ledger.get_account_balance(&account_id, &currency));
            }

            LedgerMessage::VerifyIntegrity { response } => {
                let _ = response.send(self.ledger.verify_integrity().await);
            }

            LedgerMessage::Shutdown => {
                // Handled in the main loop.
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create a handle around a mailbox sender.
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))
    }

    /// Assemble and store a transaction.
    pub async fn create_transaction(
        &self,
        grant_cycle_id: impl Into<String>,
        transaction_type: TransactionType,
        drafts: Vec<EntryDraft>,
        description: impl Into<String>,
        policy_id: Option<String>,
    ) -> Result<Transaction> {
        let grant_cycle_id = grant_cycle_id.into();
        let description = description.into();
        self.request(move |response| LedgerMessage::CreateTransaction {
            grant_cycle_id,
            transaction_type,
            drafts,
            description,
            policy_id,
            response,
        })
        .await?
    }

    /// Record a signature on a transaction.
    pub async fn add_signature(
        &self,
        transaction_id: Uuid,
        signer: impl Into<String>,
        signature: impl Into<String>,
        signature_type: SignatureType,
    ) -> Result<Transaction> {
        let signer = signer.into();
        let signature = signature.into();
        self.request(move |response| LedgerMessage::AddSignature {
            transaction_id,
            signer,
            signature,
            signature_type,
            response,
        })
        .await?
    }

    /// Drive a transaction toward a status.
    pub async fn update_status(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        actor: impl Into<String>,
    ) -> Result<Transaction> {
        let actor = actor.into();
        self.request(move |response| LedgerMessage::UpdateStatus {
            transaction_id,
            status,
            actor,
            response,
        })
        .await?
    }

    /// Cancel a transaction; `Ok(false)` when it was unknown or terminal.
    pub async fn cancel_transaction(
        &self,
        transaction_id: Uuid,
        reason: Option<String>,
        actor: impl Into<String>,
    ) -> Result<bool> {
        let actor = actor.into();
        self.request(move |response| LedgerMessage::CancelTransaction {
            transaction_id,
            reason,
            actor,
            response,
        })
        .await
    }

    /// Fetch a transaction.
    pub async fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.request(move |response| LedgerMessage::GetTransaction {
            transaction_id,
            response,
        })
        .await?
    }

    /// Fetch an entry.
    pub async fn get_entry(&self, entry_id: Uuid) -> Result<Entry> {
        self.request(move |response| LedgerMessage::GetEntry { entry_id, response })
            .await?
    }

    /// Entries of a transaction, timestamp ascending.
    pub async fn transaction_entries(&self, transaction_id: Uuid) -> Result<Vec<Entry>> {
        self.request(move |response| LedgerMessage::TransactionEntries {
            transaction_id,
            response,
        })
        .await
    }

    /// Transaction ids of a grant cycle.
    pub async fn grant_cycle_transactions(
        &self,
        grant_cycle_id: impl Into<String>,
    ) -> Result<Vec<Uuid>> {
        let grant_cycle_id = grant_cycle_id.into();
        self.request(move |response| LedgerMessage::GrantCycleTransactions {
            grant_cycle_id,
            response,
        })
        .await
    }

    /// Account balance.
    pub async fn get_account_balance(
        &self,
        account_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Result<Balance> {
        let account_id = account_id.into();
        let currency = currency.into();
        self.request(move |response| LedgerMessage::GetBalance {
            account_id,
            currency,
            response,
        })
        .await
    }

    /// Run a full integrity sweep.
    pub async fn verify_integrity(&self) -> Result<IntegrityReport> {
        self.request(|response| LedgerMessage::VerifyIntegrity { response })
            .await?
    }

    /// Shut the actor down.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))
    }
}

/// Spawn the ledger actor and return its handle.
pub fn spawn_ledger_actor(ledger: Ledger) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(256); // Bounded for backpressure
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::{Account, AccountOwner, AccountType, EntryType, OwnerType};
    use rust_decimal_macros::dec;

    fn drafts() -> Vec<EntryDraft> {
        let account = |id: &str, account_type| Account {
            id: id.to_string(),
            account_type,
            owner: AccountOwner {
                id: "org-1".to_string(),
                owner_type: OwnerType::Organization,
                name: None,
            },
        };
        vec![
            EntryDraft::new(
                account("funding", AccountType::Funding),
                dec!(100.00),
                "USD",
                EntryType::Debit,
                "out",
            ),
            EntryDraft::new(
                account("disbursement", AccountType::Disbursement),
                dec!(100.00),
                "USD",
                EntryType::Credit,
                "in",
            ),
        ]
    }

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let handle = spawn_ledger_actor(ledger);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_workflow_through_handle() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let handle = spawn_ledger_actor(ledger);

        let tx = handle
            .create_transaction(
                "cycle-1",
                TransactionType::Allocation,
                drafts(),
                "allocation",
                None,
            )
            .await
            .unwrap();

        handle
            .add_signature(tx.id, "signer-A", "aa", SignatureType::EdDsa)
            .await
            .unwrap();
        let approved = handle
            .add_signature(tx.id, "signer-B", "bb", SignatureType::EdDsa)
            .await
            .unwrap();
        assert_eq!(approved.status, TransactionStatus::Approved);

        let executed = handle
            .update_status(tx.id, TransactionStatus::Executed, "test")
            .await
            .unwrap();
        assert_eq!(executed.status, TransactionStatus::Executed);

        let balance = handle.get_account_balance("funding", "USD").await.unwrap();
        assert_eq!(balance.balance, dec!(-100.00));

        let report = handle.verify_integrity().await.unwrap();
        assert!(report.valid());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_assemblies_never_interleave() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let handle = spawn_ledger_actor(ledger);

        let mut joins = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                handle
                    .create_transaction(
                        "cycle-1",
                        TransactionType::Allocation,
                        drafts(),
                        "concurrent allocation",
                        None,
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut transactions = Vec::new();
        for join in joins {
            transactions.push(join.await.unwrap());
        }

        // Every transaction's entries are adjacent in the chain.
        for tx in &transactions {
            let entries = handle.transaction_entries(tx.id).await.unwrap();
            assert_eq!(entries.len(), 2);
            assert_eq!(
                entries[1].previous_hash.as_deref(),
                Some(entries[0].hash.as_str())
            );
        }

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_unknown_transaction_is_ok() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let handle = spawn_ledger_actor(ledger);

        let cancelled = handle
            .cancel_transaction(Uuid::new_v4(), Some("stale".to_string()), "queue")
            .await
            .unwrap();
        assert!(!cancelled);

        handle.shutdown().await.unwrap();
    }
}
