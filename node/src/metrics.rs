//! # Prometheus Metrics
//!
//! Operational counters for a scenario run. The runner has no HTTP surface,
//! so `simulate --metrics` prints the text exposition after the report.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Holds all Prometheus metric handles for the runner.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Operations that completed, by operation name.
    pub operations_executed_total: IntCounterVec,
    /// Operations that reverted, by error kind.
    pub operations_failed_total: IntCounterVec,
    /// Per-token transfers a batch settled, by direction.
    pub settled_transfers_total: IntCounterVec,
    /// Steps per batch path.
    pub path_length: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once per run.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("tidal".into()), None)?;

        let operations_executed_total = IntCounterVec::new(
            Opts::new("operations_executed_total", "Scenario operations that completed"),
            &["op"],
        )?;
        registry.register(Box::new(operations_executed_total.clone()))?;

        let operations_failed_total = IntCounterVec::new(
            Opts::new("operations_failed_total", "Scenario operations that reverted, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(operations_failed_total.clone()))?;

        let settled_transfers_total = IntCounterVec::new(
            Opts::new(
                "settled_transfers_total",
                "Per-token transfers between batch senders and the vault after netting",
            ),
            &["direction"],
        )?;
        registry.register(Box::new(settled_transfers_total.clone()))?;

        let path_length = Histogram::with_opts(
            HistogramOpts::new("path_length", "Steps per batch swap path")
                .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0]),
        )?;
        registry.register(Box::new(path_length.clone()))?;

        Ok(Self {
            registry,
            operations_executed_total,
            operations_failed_total,
            settled_transfers_total,
            path_length,
        })
    }

    /// Records a completed operation.
    pub fn executed(&self, op: &str) {
        self.operations_executed_total.with_label_values(&[op]).inc();
    }

    /// Records a reverted operation.
    pub fn failed(&self, kind: &str) {
        self.operations_failed_total.with_label_values(&[kind]).inc();
    }

    /// Records the boundary transfers of one settled batch.
    pub fn settled(&self, paid_in: usize, paid_out: usize) {
        self.settled_transfers_total
            .with_label_values(&["in"])
            .inc_by(paid_in as u64);
        self.settled_transfers_total
            .with_label_values(&["out"])
            .inc_by(paid_out as u64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
