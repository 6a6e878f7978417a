//! Prometheus exposition of swap families
//!
//! The sink stages families during a cycle and publishes them atomically in
//! `end_cycle`, so a scrape never sees half a cycle and families that were not
//! produced in the latest cycle drop out of the exposition.

use super::MetricSink;
use crate::error::DispatchError;
use crate::metrics::{
    MetricFamily, MetricType, MetricValue, FAM_IO, FAM_OPERATIONS, FAM_USAGE, FAM_UTILIZATION,
    LABEL_DEVICE, LABEL_DIRECTION, LABEL_STATE,
};
use prometheus::core::{Collector, Desc};
use prometheus::proto;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

type Published = Arc<RwLock<Vec<proto::MetricFamily>>>;

/// Rewrite a dotted metric or label name into a valid Prometheus name
pub fn exposition_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ':' { c } else { '_' })
        .collect()
}

/// Prometheus collector serving the last completed cycle
pub struct SwapFamilyCollector {
    descs: Vec<Desc>,
    published: Published,
}

impl Collector for SwapFamilyCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        match self.published.read() {
            Ok(families) => families.clone(),
            Err(_) => {
                warn!("Swap exposition lock poisoned, serving nothing");
                Vec::new()
            }
        }
    }
}

/// Sink feeding a [`SwapFamilyCollector`]
pub struct PrometheusSink {
    staged: Vec<proto::MetricFamily>,
    published: Published,
}

impl PrometheusSink {
    /// Create a sink and the collector that exposes what it publishes
    pub fn new() -> prometheus::Result<(Self, SwapFamilyCollector)> {
        let usage_labels = [LABEL_DEVICE, LABEL_STATE];
        let io_labels = [LABEL_DIRECTION];

        let descs = vec![
            family_desc(FAM_USAGE, "Unix swap usage", &usage_labels)?,
            family_desc(FAM_UTILIZATION, "Unix swap utilization", &usage_labels)?,
            family_desc(FAM_OPERATIONS, "Pages swapped in and out", &io_labels)?,
            family_desc(FAM_IO, "Bytes swapped in and out", &io_labels)?,
        ];

        let published: Published = Arc::new(RwLock::new(Vec::new()));
        let sink = Self {
            staged: Vec::new(),
            published: published.clone(),
        };

        Ok((sink, SwapFamilyCollector { descs, published }))
    }

    /// Create a sink whose collector is registered in `registry`
    pub fn register(registry: &prometheus::Registry) -> prometheus::Result<Self> {
        let (sink, collector) = Self::new()?;
        registry.register(Box::new(collector))?;
        Ok(sink)
    }

    /// Create a sink whose collector is registered in the default registry
    pub fn register_default() -> prometheus::Result<Self> {
        let (sink, collector) = Self::new()?;
        prometheus::register(Box::new(collector))?;
        Ok(sink)
    }
}

fn family_desc(name: &str, help: &str, labels: &[&str]) -> prometheus::Result<Desc> {
    Desc::new(
        exposition_name(name),
        help.to_string(),
        labels.iter().map(|l| exposition_name(l)).collect(),
        HashMap::new(),
    )
}

fn to_proto(family: &MetricFamily) -> proto::MetricFamily {
    let mut mf = proto::MetricFamily::default();
    mf.set_name(exposition_name(family.name()));
    mf.set_help(family.help().to_string());
    mf.set_field_type(match family.metric_type() {
        MetricType::Gauge => proto::MetricType::GAUGE,
        MetricType::Counter => proto::MetricType::COUNTER,
    });

    for record in family.metrics() {
        let mut metric = proto::Metric::default();
        for (key, value) in record.labels() {
            let mut pair = proto::LabelPair::default();
            pair.set_name(exposition_name(key));
            pair.set_value(value.clone());
            metric.mut_label().push(pair);
        }

        match record.value() {
            MetricValue::Gauge(v) => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(v);
                metric.set_gauge(gauge);
            }
            MetricValue::Counter(v) => {
                let mut counter = proto::Counter::default();
                counter.set_value(v as f64);
                metric.set_counter(counter);
            }
        }

        mf.mut_metric().push(metric);
    }

    mf
}

impl MetricSink for PrometheusSink {
    fn dispatch(&mut self, family: &MetricFamily) -> Result<(), DispatchError> {
        self.staged.push(to_proto(family));
        Ok(())
    }

    fn end_cycle(&mut self) {
        let staged = std::mem::take(&mut self.staged);
        match self.published.write() {
            Ok(mut published) => *published = staged,
            Err(_) => warn!("Swap exposition lock poisoned, dropping cycle"),
        }
    }
}
