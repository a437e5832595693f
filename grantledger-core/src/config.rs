//! Configuration for the grant ledger

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Signatures required to approve a transaction (1..=10)
    pub required_signatures: u8,

    /// ISO 4217 codes the validator accepts without warning
    pub supported_currencies: Vec<String>,

    /// Upper bound for a single entry amount
    pub max_transaction_amount: Decimal,

    /// Currency assumed when a caller supplies none
    pub default_currency: String,

    /// When false, every transaction approves after one signature
    pub enable_multi_signature: bool,

    /// Whether zero-knowledge proof descriptors are carried on entries
    pub enable_zk_proofs: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            required_signatures: 2,
            supported_currencies: vec![
                "USD".to_string(),
                "EUR".to_string(),
                "GBP".to_string(),
                "KES".to_string(),
                "INR".to_string(),
            ],
            max_transaction_amount: Decimal::new(1_000_000_00, 2), // 1,000,000.00
            default_currency: "USD".to_string(),
            enable_multi_signature: true,
            enable_zk_proofs: false,
        }
    }
}

impl LedgerConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config: {}", e)))?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut config = LedgerConfig::default();

        if let Ok(n) = std::env::var("GRANTLEDGER_REQUIRED_SIGNATURES") {
            config.required_signatures = n
                .parse()
                .map_err(|e| crate::Error::Config(format!("invalid required_signatures: {}", e)))?;
        }

        if let Ok(list) = std::env::var("GRANTLEDGER_SUPPORTED_CURRENCIES") {
            config.supported_currencies =
                list.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(max) = std::env::var("GRANTLEDGER_MAX_TRANSACTION_AMOUNT") {
            config.max_transaction_amount = Decimal::from_str(&max)
                .map_err(|e| crate::Error::Config(format!("invalid max amount: {}", e)))?;
        }

        if let Ok(currency) = std::env::var("GRANTLEDGER_DEFAULT_CURRENCY") {
            config.default_currency = currency;
        }

        if let Ok(flag) = std::env::var("GRANTLEDGER_ENABLE_MULTI_SIGNATURE") {
            config.enable_multi_signature = flag == "true" || flag == "1";
        }

        if let Ok(flag) = std::env::var("GRANTLEDGER_ENABLE_ZK_PROOFS") {
            config.enable_zk_proofs = flag == "true" || flag == "1";
        }

        config.validate()?;
        Ok(config)
    }

    /// Check config invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=10).contains(&self.required_signatures) {
            return Err(crate::Error::Config(format!(
                "required_signatures must be in 1..=10, got {}",
                self.required_signatures
            )));
        }
        if self.max_transaction_amount <= Decimal::ZERO {
            return Err(crate::Error::Config(
                "max_transaction_amount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
