//! Swap collection loop
//!
//! Drives one plugin read per interval tick until shutdown, recording
//! self-metrics and component health for every cycle. Reads run on the
//! blocking pool since every backend does file or system-call I/O.

use super::RawReader;
use crate::error::CollectError;
use crate::health::{components, HealthRegistry};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::plugin::{CycleReport, SwapPlugin};
use crate::sink::MetricSink;
use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Time between cycles (default: 10 seconds)
    pub interval: Duration,
    /// Consecutive failed cycles before the collector is marked unhealthy
    /// (default: 5)
    pub unhealthy_after: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            unhealthy_after: 5,
        }
    }
}

/// Plugin and sink, handed to the blocking pool for each cycle
struct CycleWorker<R> {
    plugin: SwapPlugin<R>,
    sink: Box<dyn MetricSink + Send>,
}

/// Periodic driver for a [`SwapPlugin`]
pub struct CollectionLoop<R> {
    worker: Arc<Mutex<CycleWorker<R>>>,
    config: CollectionConfig,
    metrics: AgentMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
    consecutive_failures: u32,
}

impl<R: RawReader + Send + 'static> CollectionLoop<R> {
    /// Run until `shutdown` fires or its sender is dropped
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            backend = R::NAME,
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting swap collection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle_count = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycle_count += 1;
                    if let Ok(report) = self.run_cycle().await {
                        debug!(
                            cycle = cycle_count,
                            readings = report.readings,
                            dispatched = report.dispatched,
                            "Collection cycle complete"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    info!(cycles = cycle_count, "Shutting down swap collection loop");
                    break;
                }
            }
        }
    }

    /// Run a single cycle and record its outcome.
    /// Failures are logged and reported, never fatal.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, CollectError> {
        let start = Instant::now();
        let worker = Arc::clone(&self.worker);
        let result = tokio::task::spawn_blocking(move || {
            let mut worker = worker
                .lock()
                .map_err(|_| CollectError::Worker("collection state poisoned".to_string()))?;
            let CycleWorker { plugin, sink } = &mut *worker;
            plugin.read(&mut **sink)
        })
        .await
        .unwrap_or_else(|e| Err(CollectError::Worker(e.to_string())));

        self.metrics
            .observe_collection_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_cycles();

        match &result {
            Ok(report) => {
                self.metrics.add_skipped_entries(report.skipped);
                self.metrics.add_dispatch_errors(report.dispatch_failures);
                self.metrics.set_swap_areas(report.readings);
                self.consecutive_failures = 0;
                self.health.set_healthy(components::COLLECTOR).await;

                if report.dispatch_failures > 0 {
                    self.health
                        .set_degraded(
                            components::EXPORTER,
                            format!("{} families failed to dispatch", report.dispatch_failures),
                        )
                        .await;
                } else {
                    self.health.set_healthy(components::EXPORTER).await;
                }
            }
            Err(e) => {
                self.metrics.inc_collection_errors(e);
                self.logger.log_cycle_failure(R::NAME, e);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.config.unhealthy_after {
                    let message =
                        format!("{} consecutive cycles failed: {e}", self.consecutive_failures);
                    self.health
                        .set_unhealthy(components::COLLECTOR, message)
                        .await;
                } else {
                    self.health
                        .set_degraded(components::COLLECTOR, e.to_string())
                        .await;
                }
            }
        }

        result
    }
}

/// Builder for the collection loop
pub struct CollectionLoopBuilder<R> {
    plugin: Option<SwapPlugin<R>>,
    sink: Option<Box<dyn MetricSink + Send>>,
    config: CollectionConfig,
    health: Option<HealthRegistry>,
    node_name: String,
}

impl<R: RawReader> CollectionLoopBuilder<R> {
    pub fn new() -> Self {
        Self {
            plugin: None,
            sink: None,
            config: CollectionConfig::default(),
            health: None,
            node_name: "unknown".to_string(),
        }
    }

    /// Set the initialized plugin
    pub fn plugin(mut self, plugin: SwapPlugin<R>) -> Self {
        self.plugin = Some(plugin);
        self
    }

    /// Set the destination for metric families
    pub fn sink(mut self, sink: impl MetricSink + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Set the collection interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set how many failed cycles in a row mark the collector unhealthy
    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.config.unhealthy_after = failures;
        self
    }

    /// Share a health registry with the API server
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn build(self) -> Result<CollectionLoop<R>> {
        let plugin = self
            .plugin
            .ok_or_else(|| anyhow::anyhow!("Plugin is required"))?;
        let sink = self
            .sink
            .ok_or_else(|| anyhow::anyhow!("Sink is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be non-zero");
        }
        if self.config.unhealthy_after == 0 {
            anyhow::bail!("Unhealthy threshold must be at least one cycle");
        }

        Ok(CollectionLoop {
            worker: Arc::new(Mutex::new(CycleWorker { plugin, sink })),
            config: self.config,
            metrics: AgentMetrics::new(),
            health: self.health.unwrap_or_default(),
            logger: StructuredLogger::new(self.node_name),
            consecutive_failures: 0,
        })
    }
}

impl<R: RawReader> Default for CollectionLoopBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
