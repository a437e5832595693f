//! Blockchain submission sink
//!
//! The engine anchors executed transactions through an opaque sink; it
//! never depends on which chain sits behind the interface. The submission
//! payload carries the transaction Merkle root (SHA-256 over the
//! concatenated entry hashes in entry order).

use crate::canonical;
use crate::error::{Error, Result};
use crate::types::{BlockchainRecord, Entry, Transaction};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::time::Duration;

/// Opaque endpoint accepting transactions and returning chain-side hashes
#[async_trait]
pub trait BlockchainSink: Send + Sync {
    /// Submit a transaction; returns the chain-side transaction hash.
    async fn submit(&self, tx: &Transaction, entries: &[Entry]) -> Result<String>;

    /// Confirm that a previously submitted hash is anchored.
    async fn verify(&self, tx_hash: &str) -> Result<bool>;

    /// Chain-side metadata for a submitted hash.
    async fn metadata(&self, tx_hash: &str) -> Result<BlockchainRecord>;
}

/// In-process sink used for tests and local runs.
///
/// Simulates latency and lets tests force submission failures. Submitted
/// hashes are remembered so `verify` answers honestly.
#[derive(Debug)]
pub struct MockChainSink {
    chain_name: String,
    latency: Duration,
    healthy: AtomicBool,
    next_block: AtomicU64,
    submitted: RwLock<HashMap<String, u64>>,
}

impl MockChainSink {
    /// Create a sink with the given simulated latency.
    pub fn new(latency: Duration) -> Self {
        Self {
            chain_name: "mockchain".to_string(),
            latency,
            healthy: AtomicBool::new(true),
            next_block: AtomicU64::new(1),
            submitted: RwLock::new(HashMap::new()),
        }
    }

    /// Flip the sink between healthy and failing.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Default for MockChainSink {
    fn default() -> Self {
        Self::new(Duration::from_millis(1))
    }
}

#[async_trait]
impl BlockchainSink for MockChainSink {
    async fn submit(&self, tx: &Transaction, entries: &[Entry]) -> Result<String> {
        tokio::time::sleep(self.latency).await;

        if !self.healthy.load(Ordering::SeqCst) {
            tracing::warn!(transaction_id = %tx.id, "mock sink refusing submission");
            return Err(Error::SinkFailure("mock sink unavailable".to_string()));
        }

        let hashes: Vec<String> = entries.iter().map(|e| e.hash.clone()).collect();
        let root = canonical::merkle_root(&hashes);
        let tx_hash = format!("0x{}", canonical::hash_bytes(
            format!("{}:{}:{}", self.chain_name, tx.id, root).as_bytes(),
        ));

        let block = self.next_block.fetch_add(1, Ordering::SeqCst);
        self.submitted.write().await.insert(tx_hash.clone(), block);
        tracing::info!(transaction_id = %tx.id, tx_hash = %tx_hash, "mock sink accepted submission");
        Ok(tx_hash)
    }

    async fn verify(&self, tx_hash: &str) -> Result<bool> {
        tokio::time::sleep(self.latency).await;
        Ok(self.submitted.read().await.contains_key(tx_hash))
    }

    async fn metadata(&self, tx_hash: &str) -> Result<BlockchainRecord> {
        let submitted = self.submitted.read().await;
        let block = submitted.get(tx_hash).ok_or_else(|| Error::NotFound {
            kind: "submission",
            id: tx_hash.to_string(),
        })?;
        Ok(BlockchainRecord {
            blockchain: self.chain_name.clone(),
            tx_hash: tx_hash.to_string(),
            block_number: Some(*block),
            gas_used: Some(21_000),
            confirmations: Some(1),
        })
    }
}

/// Merkle root of a transaction's entries, for callers that anchor
/// externally.
pub fn transaction_merkle_root(entries: &[Entry]) -> String {
    let hashes: Vec<String> = entries.iter().map(|e| e.hash.clone()).collect();
    canonical::merkle_root(&hashes)
}

/// Build a minimal record when the sink cannot supply metadata.
pub(crate) fn fallback_record(chain: &str, tx_hash: &str) -> BlockchainRecord {
    BlockchainRecord {
        blockchain: chain.to_string(),
        tx_hash: tx_hash.to_string(),
        block_number: None,
        gas_used: None,
        confirmations: None,
    }
}
