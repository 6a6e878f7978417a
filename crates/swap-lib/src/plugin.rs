//! Plugin lifecycle: one-time init, then one read per cycle

use crate::collector::{system_page_size, RawReader};
use crate::config::SwapConfig;
use crate::error::{CollectError, InitError};
use crate::metrics::FamilyRegistry;
use crate::normalize::{submit_io, submit_usage};
use crate::sink::MetricSink;
use tracing::{debug, info};

/// Settings fixed at init and shared by every cycle
#[derive(Debug, Clone)]
pub struct SwapContext {
    pub page_size: u64,
    pub config: SwapConfig,
}

/// Result of one successful cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Usage readings produced by the backend
    pub readings: usize,
    /// Entries the backend skipped as malformed or inconsistent
    pub skipped: usize,
    pub dispatched: usize,
    pub dispatch_failures: usize,
}

/// Swap collector bound to one backend
pub struct SwapPlugin<R> {
    ctx: SwapContext,
    reader: R,
}

impl<R: RawReader> SwapPlugin<R> {
    /// Query the page size and open the backend
    pub fn init(config: SwapConfig) -> Result<Self, InitError> {
        let ctx = SwapContext {
            page_size: system_page_size()?,
            config,
        };
        let reader = R::open(&ctx)?;

        info!(
            backend = R::NAME,
            page_size = ctx.page_size,
            by_device = ctx.config.report_by_device,
            report_bytes = ctx.config.report_bytes,
            "Swap plugin initialized"
        );

        Ok(Self { ctx, reader })
    }

    /// Build a plugin around an already opened reader
    pub fn with_reader(ctx: SwapContext, reader: R) -> Self {
        Self { ctx, reader }
    }

    /// Run one cycle: collect, normalize, dispatch.
    ///
    /// A collection error dispatches nothing. The sink's `end_cycle` is
    /// called either way.
    pub fn read(&mut self, sink: &mut dyn MetricSink) -> Result<CycleReport, CollectError> {
        let sample = match self.reader.collect(&self.ctx) {
            Ok(sample) => sample,
            Err(e) => {
                sink.end_cycle();
                return Err(e);
            }
        };

        let mut families = FamilyRegistry::new();
        for reading in &sample.readings {
            submit_usage(&mut families, reading, &self.ctx.config);
        }
        if let Some(activity) = sample.paging {
            submit_io(
                &mut families,
                activity,
                self.ctx.page_size,
                &self.ctx.config,
                R::CAPABILITIES,
            );
        }

        let summary = families.dispatch(sink);
        sink.end_cycle();

        debug!(
            readings = sample.readings.len(),
            skipped = sample.skipped,
            dispatched = summary.dispatched,
            failed = summary.failed,
            "Swap cycle complete"
        );

        Ok(CycleReport {
            readings: sample.readings.len(),
            skipped: sample.skipped,
            dispatched: summary.dispatched,
            dispatch_failures: summary.failed,
        })
    }
}
