//! Canonical serialization and hashing
//!
//! The entry hash is SHA-256 over the UTF-8 bytes of a canonical JSON
//! rendering of the entry payload. Canonical here means: top-level keys
//! sorted lexicographically, nested objects left in insertion order, and
//! the `hash`, `signatures` and `status` fields excluded. The sorting
//! depth is deliberate — it must match byte-for-byte what existing chains
//! were hashed with, so only the top level is sorted.

use crate::error::Result;
use crate::types::Entry;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Fields excluded from the hashing payload.
const EXCLUDED: [&str; 3] = ["hash", "signatures", "status"];

/// Build the hashing payload for an entry: its wire shape minus the
/// excluded fields. Nested objects keep their serialized field order.
pub fn entry_payload(entry: &Entry) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(entry)?;
    let mut map = match value {
        Value::Object(map) => map,
        _ => unreachable!("entries serialize to objects"),
    };
    for field in EXCLUDED {
        map.remove(field);
    }
    Ok(map)
}

/// Render a payload as canonical JSON: compact, top-level keys sorted.
pub fn canonical_json(payload: &Map<String, Value>) -> Result<String> {
    let mut keys: Vec<&String> = payload.keys().collect();
    keys.sort();

    let mut out = String::from("{");
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(key)?);
        out.push(':');
        out.push_str(&serde_json::to_string(&payload[key.as_str()])?);
    }
    out.push('}');
    Ok(out)
}

/// SHA-256 of arbitrary bytes, lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash a payload map.
pub fn hash_payload(payload: &Map<String, Value>) -> Result<String> {
    Ok(hash_bytes(canonical_json(payload)?.as_bytes()))
}

/// Recompute the hash of an entry from its current field values.
pub fn hash_entry(entry: &Entry) -> Result<String> {
    hash_payload(&entry_payload(entry)?)
}

/// Merkle root of a transaction for the submission payload: SHA-256 over
/// the concatenation of entry hashes in entry order.
pub fn merkle_root(entry_hashes: &[String]) -> String {
    let concatenated: String = entry_hashes.concat();
    hash_bytes(concatenated.as_bytes())
}
