//! Append-only entry store
//!
//! Exclusive owner of all [`Entry`] records. Entries are chained: each new
//! entry carries the hash of the store tip as its `previousHash`, and the
//! tip advances to the new entry's hash. The chain order is the append
//! order; no interleaving is possible because all writers go through the
//! single engine task.

use crate::canonical;
use crate::error::{Error, Result};
use crate::types::{
    Account, Entry, EntrySignature, EntryStatus, EntryType, ZkProofRef,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Descriptor for an entry to be appended. The store assigns id,
/// timestamp, previous hash, hash and status.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    /// Affected account
    pub account: Account,
    /// Non-negative magnitude
    pub amount: Decimal,
    /// ISO 4217 currency
    pub currency: String,
    /// Direction
    pub entry_type: EntryType,
    /// Human-readable description
    pub description: String,
    /// Free-form metadata
    pub metadata: serde_json::Map<String, Value>,
    /// Optional proof descriptor
    pub zk_proof: Option<ZkProofRef>,
}

impl EntryDraft {
    /// Minimal draft with empty metadata and no proof.
    pub fn new(
        account: Account,
        amount: Decimal,
        currency: impl Into<String>,
        entry_type: EntryType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account,
            amount,
            currency: currency.into(),
            entry_type,
            description: description.into(),
            metadata: serde_json::Map::new(),
            zk_proof: None,
        }
    }
}

/// Append-only log of entries with a chain tip
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    index: HashMap<Uuid, usize>,
    tip: Option<String>,
}

impl EntryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the most recently appended entry, if any.
    pub fn tip(&self) -> Option<&str> {
        self.tip.as_deref()
    }

    /// Number of entries in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialize a draft into a finalized entry chained onto
    /// `previous_hash`, without storing it. Used by the assembler to stage
    /// a whole transaction before committing it atomically.
    pub fn materialize(
        grant_cycle_id: &str,
        transaction_id: Uuid,
        draft: EntryDraft,
        previous_hash: Option<String>,
    ) -> Result<Entry> {
        let mut entry = Entry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            grant_cycle_id: grant_cycle_id.to_string(),
            transaction_id,
            account: draft.account,
            amount: draft.amount,
            currency: draft.currency,
            entry_type: draft.entry_type,
            description: draft.description,
            metadata: draft.metadata,
            previous_hash,
            hash: String::new(),
            signatures: vec![],
            zk_proof: draft.zk_proof,
            status: EntryStatus::Pending,
        };
        entry.hash = canonical::hash_entry(&entry)?;
        Ok(entry)
    }

    /// Append a single draft: materialize against the current tip, store,
    /// advance the tip. Returns the finalized entry with status PENDING.
    pub fn append(
        &mut self,
        grant_cycle_id: &str,
        transaction_id: Uuid,
        draft: EntryDraft,
    ) -> Result<Entry> {
        let entry =
            Self::materialize(grant_cycle_id, transaction_id, draft, self.tip.clone())?;
        self.commit(vec![entry.clone()]);
        Ok(entry)
    }

    /// Store a batch of already-chained entries and advance the tip to the
    /// last one. Callers must have chained the batch off the current tip.
    pub fn commit(&mut self, staged: Vec<Entry>) {
        for entry in staged {
            debug_assert_eq!(entry.previous_hash.as_deref(), self.tip());
            tracing::debug!(entry_id = %entry.id, hash = %entry.hash, "entry appended");
            self.tip = Some(entry.hash.clone());
            self.index.insert(entry.id, self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Look up an entry by id.
    pub fn get(&self, id: Uuid) -> Option<&Entry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// All entries of a transaction, timestamp ascending with creation
    /// order as tiebreaker.
    pub fn by_transaction(&self, transaction_id: Uuid) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|e| e.transaction_id == transaction_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Transaction ids seen in a grant cycle, first-appearance order.
    pub fn by_grant_cycle(&self, grant_cycle_id: &str) -> Vec<Uuid> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if entry.grant_cycle_id == grant_cycle_id && !seen.contains(&entry.transaction_id) {
                seen.push(entry.transaction_id);
            }
        }
        seen
    }

    /// Transition an entry's status. PENDING may move to CONFIRMED,
    /// REJECTED or CANCELLED; everything else is terminal.
    pub fn set_status(&mut self, id: Uuid, status: EntryStatus) -> Result<()> {
        let index = *self.index.get(&id).ok_or_else(|| Error::NotFound {
            kind: "entry",
            id: id.to_string(),
        })?;
        let entry = &mut self.entries[index];
        if entry.status.is_terminal() {
            return Err(Error::IllegalEntryTransition {
                from: entry.status,
                to: status,
            });
        }
        entry.status = status;
        Ok(())
    }

    /// Append a signature to an entry. Signatures accrue even after
    /// CONFIRMED; they are outside the hashing payload.
    pub fn add_signature(&mut self, id: Uuid, signature: EntrySignature) -> Result<()> {
        let index = *self.index.get(&id).ok_or_else(|| Error::NotFound {
            kind: "entry",
            id: id.to_string(),
        })?;
        self.entries[index].signatures.push(signature);
        Ok(())
    }

    /// Snapshot of the full log ordered by (timestamp, creation sequence).
    pub fn time_ordered(&self) -> Vec<Entry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountOwner, AccountType, OwnerType};
    use rust_decimal_macros::dec;

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            account_type: AccountType::Funding,
            owner: AccountOwner {
                id: "org-1".to_string(),
                owner_type: OwnerType::Organization,
                name: None,
            },
        }
    }

    fn draft(amount: Decimal, entry_type: EntryType) -> EntryDraft {
        EntryDraft::new(account("funding"), amount, "USD", entry_type, "test entry")
    }

    #[test]
    fn test_append_chains_entries() {
        let mut store = EntryStore::new();
        let tx = Uuid::new_v4();

        let first = store
            .append("cycle-1", tx, draft(dec!(100), EntryType::Credit))
            .unwrap();
        assert!(first.previous_hash.is_none());
        assert_eq!(store.tip(), Some(first.hash.as_str()));

        let second = store
            .append("cycle-1", tx, draft(dec!(100), EntryType::Debit))
            .unwrap();
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert_eq!(store.tip(), Some(second.hash.as_str()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_append_sets_pending_and_uuid_v4() {
        let mut store = EntryStore::new();
        let entry = store
            .append("cycle-1", Uuid::new_v4(), draft(dec!(5), EntryType::Credit))
            .unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.id.get_version_num(), 4);
        assert_eq!(entry.hash.len(), 64);
    }

    #[test]
    fn test_by_transaction_ordering() {
        let mut store = EntryStore::new();
        let tx = Uuid::new_v4();
        let other = Uuid::new_v4();

        let a = store
            .append("cycle-1", tx, draft(dec!(1), EntryType::Credit))
            .unwrap();
        store
            .append("cycle-1", other, draft(dec!(2), EntryType::Credit))
            .unwrap();
        let c = store
            .append("cycle-1", tx, draft(dec!(1), EntryType::Debit))
            .unwrap();

        let entries = store.by_transaction(tx);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, a.id);
        assert_eq!(entries[1].id, c.id);
    }

    #[test]
    fn test_by_grant_cycle_transaction_ids() {
        let mut store = EntryStore::new();
        let tx1 = Uuid::new_v4();
        let tx2 = Uuid::new_v4();

        store
            .append("cycle-1", tx1, draft(dec!(1), EntryType::Credit))
            .unwrap();
        store
            .append("cycle-1", tx1, draft(dec!(1), EntryType::Debit))
            .unwrap();
        store
            .append("cycle-1", tx2, draft(dec!(2), EntryType::Credit))
            .unwrap();
        store
            .append("cycle-2", Uuid::new_v4(), draft(dec!(3), EntryType::Credit))
            .unwrap();

        assert_eq!(store.by_grant_cycle("cycle-1"), vec![tx1, tx2]);
    }

    #[test]
    fn test_set_status_terminal_rules() {
        let mut store = EntryStore::new();
        let entry = store
            .append("cycle-1", Uuid::new_v4(), draft(dec!(1), EntryType::Credit))
            .unwrap();

        store.set_status(entry.id, EntryStatus::Confirmed).unwrap();
        let err = store
            .set_status(entry.id, EntryStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(err, Error::IllegalEntryTransition { .. }));
    }

    #[test]
    fn test_signature_after_confirmed_allowed() {
        let mut store = EntryStore::new();
        let entry = store
            .append("cycle-1", Uuid::new_v4(), draft(dec!(1), EntryType::Credit))
            .unwrap();
        store.set_status(entry.id, EntryStatus::Confirmed).unwrap();

        let hash_before = store.get(entry.id).unwrap().hash.clone();
        store
            .add_signature(
                entry.id,
                EntrySignature {
                    signer: "signer-A".to_string(),
                    signature: "ff00".to_string(),
                    timestamp: Utc::now(),
                    signature_type: crate::types::SignatureType::EdDsa,
                },
            )
            .unwrap();

        let stored = store.get(entry.id).unwrap();
        assert_eq!(stored.signatures.len(), 1);
        // The hash covers only the immutable payload.
        assert_eq!(stored.hash, hash_before);
        assert_eq!(canonical::hash_entry(stored).unwrap(), hash_before);
    }

    #[test]
    fn test_commit_staged_batch() {
        let mut store = EntryStore::new();
        let tx = Uuid::new_v4();

        let first = EntryStore::materialize(
            "cycle-1",
            tx,
            draft(dec!(10), EntryType::Credit),
            store.tip().map(String::from),
        )
        .unwrap();
        let second = EntryStore::materialize(
            "cycle-1",
            tx,
            draft(dec!(10), EntryType::Debit),
            Some(first.hash.clone()),
        )
        .unwrap();

        store.commit(vec![first.clone(), second.clone()]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.tip(), Some(second.hash.as_str()));
        assert_eq!(store.get(first.id).unwrap().id, first.id);
    }
}
