//! Signature oracle
//!
//! The core never parses signature bytes; it delegates to an oracle that
//! reports per-signer validity. The structural oracle shipped here only
//! checks that signature material is present — real verification belongs
//! to an external service.

use crate::error::Result;
use crate::types::Entry;
use async_trait::async_trait;

/// Per-signer verdict
#[derive(Debug, Clone)]
pub struct SignerVerdict {
    /// Signer identity
    pub signer: String,
    /// Whether this signer's signature held up
    pub valid: bool,
}

/// Verdict over all signatures of one entry
#[derive(Debug, Clone)]
pub struct SignatureReport {
    /// True when every signature on the entry held up
    pub valid: bool,
    /// Per-signer details, signature order
    pub details: Vec<SignerVerdict>,
}

/// Pluggable signature checker
#[async_trait]
pub trait SignatureOracle: Send + Sync {
    /// Check all signatures attached to an entry.
    async fn verify_entry(&self, entry: &Entry) -> Result<SignatureReport>;
}

/// Structural oracle: a signature is valid when its material is non-empty.
#[derive(Debug, Default)]
pub struct StructuralOracle;

#[async_trait]
impl SignatureOracle for StructuralOracle {
    async fn verify_entry(&self, entry: &Entry) -> Result<SignatureReport> {
        let details: Vec<SignerVerdict> = entry
            .signatures
            .iter()
            .map(|s| SignerVerdict {
                signer: s.signer.clone(),
                valid: !s.signature.is_empty(),
            })
            .collect();
        let valid = details.iter().all(|d| d.valid);
        Ok(SignatureReport { valid, details })
    }
}
