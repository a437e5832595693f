//! Metrics collection for observability
//!
//! Prometheus metrics for monitoring the ledger engine:
//!
//! - `grantledger_entries_total` - entries appended
//! - `grantledger_transactions_total` - transactions created
//! - `grantledger_signatures_total` - signatures recorded
//! - `grantledger_executions_total` - transactions executed
//! - `grantledger_rejections_total` - transactions rejected
//! - `grantledger_integrity_sweeps_total` - integrity sweeps run
//! - `grantledger_entries_per_transaction` - entry count histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Entries appended
    pub entries_total: IntCounter,

    /// Transactions created
    pub transactions_total: IntCounter,

    /// Signatures recorded
    pub signatures_total: IntCounter,

    /// Transactions executed
    pub executions_total: IntCounter,

    /// Transactions rejected
    pub rejections_total: IntCounter,

    /// Integrity sweeps run
    pub integrity_sweeps_total: IntCounter,

    /// Entries per transaction
    pub entries_per_transaction: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create a collector with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let entries_total = IntCounter::with_opts(Opts::new(
            "grantledger_entries_total",
            "Total entries appended",
        ))?;
        registry.register(Box::new(entries_total.clone()))?;

        let transactions_total = IntCounter::with_opts(Opts::new(
            "grantledger_transactions_total",
            "Total transactions created",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let signatures_total = IntCounter::with_opts(Opts::new(
            "grantledger_signatures_total",
            "Total signatures recorded",
        ))?;
        registry.register(Box::new(signatures_total.clone()))?;

        let executions_total = IntCounter::with_opts(Opts::new(
            "grantledger_executions_total",
            "Total transactions executed",
        ))?;
        registry.register(Box::new(executions_total.clone()))?;

        let rejections_total = IntCounter::with_opts(Opts::new(
            "grantledger_rejections_total",
            "Total transactions rejected",
        ))?;
        registry.register(Box::new(rejections_total.clone()))?;

        let integrity_sweeps_total = IntCounter::with_opts(Opts::new(
            "grantledger_integrity_sweeps_total",
            "Total integrity sweeps run",
        ))?;
        registry.register(Box::new(integrity_sweeps_total.clone()))?;

        let entries_per_transaction = Histogram::with_opts(
            HistogramOpts::new(
                "grantledger_entries_per_transaction",
                "Histogram of entries per transaction",
            )
            .buckets(vec![2.0, 4.0, 8.0, 16.0, 32.0, 64.0]),
        )?;
        registry.register(Box::new(entries_per_transaction.clone()))?;

        Ok(Self {
            entries_total,
            transactions_total,
            signatures_total,
            executions_total,
            rejections_total,
            integrity_sweeps_total,
            entries_per_transaction,
            registry,
        })
    }

    /// Record a created transaction with its entry count.
    pub fn record_transaction(&self, entry_count: usize) {
        self.transactions_total.inc();
        self.entries_total.inc_by(entry_count as u64);
        self.entries_per_transaction.observe(entry_count as f64);
    }

    /// Record a collected signature.
    pub fn record_signature(&self) {
        self.signatures_total.inc();
    }

    /// Record an executed transaction.
    pub fn record_execution(&self) {
        self.executions_total.inc();
    }

    /// Record a rejected transaction.
    pub fn record_rejection(&self) {
        self.rejections_total.inc();
    }

    /// Record an integrity sweep.
    pub fn record_integrity_sweep(&self) {
        self.integrity_sweeps_total.inc();
    }

    /// Get the metrics registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("entries_total", &self.entries_total.get())
            .field("transactions_total", &self.transactions_total.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.entries_total.get(), 0);
        assert_eq!(metrics.transactions_total.get(), 0);
    }

    #[test]
    fn test_record_transaction() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transaction(2);
        metrics.record_transaction(4);
        assert_eq!(metrics.transactions_total.get(), 2);
        assert_eq!(metrics.entries_total.get(), 6);
    }

    #[test]
    fn test_record_execution_and_rejection() {
        let metrics = Metrics::new().unwrap();
        metrics.record_execution();
        metrics.record_rejection();
        metrics.record_rejection();
        assert_eq!(metrics.executions_total.get(), 1);
        assert_eq!(metrics.rejections_total.get(), 2);
    }
}
