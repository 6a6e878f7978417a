//! Canonical metric model
//!
//! Every backend ends up here: normalizers append [`MetricRecord`]s to the
//! four families held by a [`FamilyRegistry`], which is built fresh for each
//! cycle and handed to a sink once the reader is done.

use crate::error::DispatchError;
use crate::sink::MetricSink;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

pub const FAM_USAGE: &str = "system.paging.usage";
pub const FAM_UTILIZATION: &str = "system.paging.utilization";
pub const FAM_OPERATIONS: &str = "system.paging.operations";
pub const FAM_IO: &str = "system.paging.io";

pub const LABEL_DEVICE: &str = "system.device";
pub const LABEL_STATE: &str = "system.paging.state";
pub const LABEL_DIRECTION: &str = "system.paging.direction";

pub const STATE_USED: &str = "used";
pub const STATE_FREE: &str = "free";
pub const DIRECTION_IN: &str = "in";
pub const DIRECTION_OUT: &str = "out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Counter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricValue {
    Gauge(f64),
    Counter(u64),
}

impl MetricValue {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Counter(_) => MetricType::Counter,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Gauge(v) => *v,
            MetricValue::Counter(v) => *v as f64,
        }
    }
}

/// One sample. Immutable once appended to a family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    name: &'static str,
    labels: BTreeMap<String, String>,
    value: MetricValue,
}

impl MetricRecord {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn value(&self) -> MetricValue {
        self.value
    }
}

/// Named, typed, ordered collection of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamily {
    name: &'static str,
    help: &'static str,
    #[serde(rename = "type")]
    metric_type: MetricType,
    metrics: Vec<MetricRecord>,
}

impl MetricFamily {
    pub fn new(name: &'static str, help: &'static str, metric_type: MetricType) -> Self {
        Self {
            name,
            help,
            metric_type,
            metrics: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn metrics(&self) -> &[MetricRecord] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Append a record built from `base` labels plus one extra label.
    ///
    /// A later label with the same key replaces the earlier one.
    pub fn append(
        &mut self,
        base: &[(&str, &str)],
        key: &str,
        value_label: &str,
        value: MetricValue,
    ) {
        debug_assert_eq!(value.metric_type(), self.metric_type);

        let mut labels: BTreeMap<String, String> = base
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        labels.insert(key.to_string(), value_label.to_string());

        self.metrics.push(MetricRecord {
            name: self.name,
            labels,
            value,
        });
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
    }
}

/// Outcome of handing a registry to a sink
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: usize,
    pub failed: usize,
}

/// The four families of one collection cycle
#[derive(Debug)]
pub struct FamilyRegistry {
    pub usage: MetricFamily,
    pub utilization: MetricFamily,
    /// Used when I/O is reported as page counts
    pub operations: MetricFamily,
    /// Used when I/O is reported in bytes
    pub io: MetricFamily,
}

impl Default for FamilyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self {
            usage: MetricFamily::new(FAM_USAGE, "Unix swap usage", MetricType::Gauge),
            utilization: MetricFamily::new(
                FAM_UTILIZATION,
                "Unix swap utilization",
                MetricType::Gauge,
            ),
            operations: MetricFamily::new(
                FAM_OPERATIONS,
                "Pages swapped in and out",
                MetricType::Counter,
            ),
            io: MetricFamily::new(FAM_IO, "Bytes swapped in and out", MetricType::Counter),
        }
    }

    fn families_mut(&mut self) -> [&mut MetricFamily; 4] {
        [
            &mut self.usage,
            &mut self.utilization,
            &mut self.operations,
            &mut self.io,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
            && self.utilization.is_empty()
            && self.operations.is_empty()
            && self.io.is_empty()
    }

    /// Dispatch every non-empty family, then clear all of them.
    ///
    /// A sink failure is logged and does not stop the remaining families.
    pub fn dispatch(&mut self, sink: &mut dyn MetricSink) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for family in self.families_mut() {
            if !family.is_empty() {
                match sink.dispatch(family) {
                    Ok(()) => summary.dispatched += 1,
                    Err(e) => {
                        summary.failed += 1;
                        log_dispatch_failure(family, &e);
                    }
                }
            }
            family.clear();
        }

        summary
    }
}

fn log_dispatch_failure(family: &MetricFamily, e: &DispatchError) {
    error!(
        family = family.name(),
        metrics = family.len(),
        error = %e,
        "Failed to dispatch metric family"
    );
}
