//! Self-metrics and structured event logging for the swap agent

use crate::error::CollectError;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Latency buckets in seconds
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Registered once per process in the default registry
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    collection_latency_seconds: Histogram,
    cycles: IntCounter,
    collection_errors: IntCounterVec,
    skipped_entries: IntCounter,
    dispatch_errors: IntCounter,
    swap_areas: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            collection_latency_seconds: register_histogram!(
                "swap_agent_collection_latency_seconds",
                "Time spent reading swap statistics from the OS",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register collection_latency_seconds"),

            cycles: register_int_counter!(
                "swap_agent_cycles_total",
                "Total number of collection cycles run"
            )
            .expect("Failed to register cycles_total"),

            collection_errors: register_int_counter_vec!(
                "swap_agent_collection_errors_total",
                "Total number of failed collection cycles",
                &["kind"]
            )
            .expect("Failed to register collection_errors_total"),

            skipped_entries: register_int_counter!(
                "swap_agent_skipped_entries_total",
                "Swap areas skipped as malformed or inconsistent"
            )
            .expect("Failed to register skipped_entries_total"),

            dispatch_errors: register_int_counter!(
                "swap_agent_dispatch_errors_total",
                "Metric families the sink failed to accept"
            )
            .expect("Failed to register dispatch_errors_total"),

            swap_areas: register_int_gauge!(
                "swap_agent_swap_areas",
                "Usage readings produced by the last successful cycle"
            )
            .expect("Failed to register swap_areas"),
        }
    }
}

/// Handle to the process-wide self-metrics. Clones share the same metrics.
#[derive(Clone, Copy)]
pub struct AgentMetrics {
    inner: &'static AgentMetricsInner,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(AgentMetricsInner::new),
        }
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner.collection_latency_seconds.observe(duration_secs);
    }

    pub fn inc_cycles(&self) {
        self.inner.cycles.inc();
    }

    /// Count a failed cycle under its error kind
    pub fn inc_collection_errors(&self, error: &CollectError) {
        self.inner
            .collection_errors
            .with_label_values(&[error.kind().as_str()])
            .inc();
    }

    pub fn add_skipped_entries(&self, skipped: usize) {
        self.inner.skipped_entries.inc_by(skipped as u64);
    }

    pub fn add_dispatch_errors(&self, failed: usize) {
        self.inner.dispatch_errors.inc_by(failed as u64);
    }

    pub fn set_swap_areas(&self, readings: usize) {
        self.inner.swap_areas.set(readings as i64);
    }
}

/// Structured logger for agent lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, backend: &str, interval_secs: u64) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            backend = %backend,
            interval_secs = interval_secs,
            "Swap agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Swap agent shutting down"
        );
    }

    /// A cycle failed; the next one runs on schedule
    pub fn log_cycle_failure(&self, backend: &str, error: &CollectError) {
        warn!(
            event = "cycle_failed",
            node = %self.node_name,
            backend = %backend,
            kind = error.kind().as_str(),
            error = %error,
            "Swap collection cycle failed"
        );
    }
}
