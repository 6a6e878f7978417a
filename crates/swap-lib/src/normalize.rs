//! Turn raw readings into canonical metric records
//!
//! Both normalizers are pure: they only append to the registry they are given.

use crate::config::{Capabilities, SwapConfig};
use crate::metrics::{
    FamilyRegistry, MetricValue, DIRECTION_IN, DIRECTION_OUT, LABEL_DEVICE, LABEL_DIRECTION,
    LABEL_STATE, STATE_FREE, STATE_USED,
};
use crate::models::{PagingActivity, SwapReading};

/// Append usage and utilization records for one reading.
///
/// Percentages use `used + free (+ auxiliary)` as the denominator. A zero
/// total yields NaN, which is emitted rather than dropped.
pub fn submit_usage(families: &mut FamilyRegistry, reading: &SwapReading, config: &SwapConfig) {
    let base: Vec<(&str, &str)> = match reading.device.as_deref() {
        Some(device) => vec![(LABEL_DEVICE, device)],
        None => Vec::new(),
    };

    let used = reading.used_bytes as f64;
    let free = reading.free_bytes as f64;
    let other = reading
        .auxiliary
        .as_ref()
        .map(|aux| (aux.name.as_str(), aux.bytes as f64));

    if config.values_absolute {
        let family = &mut families.usage;
        if let Some((name, bytes)) = other {
            family.append(&base, LABEL_STATE, name, MetricValue::Gauge(bytes));
        }
        family.append(&base, LABEL_STATE, STATE_USED, MetricValue::Gauge(used));
        family.append(&base, LABEL_STATE, STATE_FREE, MetricValue::Gauge(free));
    }

    if config.values_percentage {
        let total = reading.total_bytes() as f64;
        let percent = |value: f64| MetricValue::Gauge(100.0 * value / total);

        let family = &mut families.utilization;
        if let Some((name, bytes)) = other {
            family.append(&base, LABEL_STATE, name, percent(bytes));
        }
        family.append(&base, LABEL_STATE, STATE_USED, percent(used));
        family.append(&base, LABEL_STATE, STATE_FREE, percent(free));
    }
}

/// Append the paging in/out counters.
///
/// Page counts go to `system.paging.operations`; with `ReportBytes` they are
/// multiplied by the page size and go to `system.paging.io` instead.
pub fn submit_io(
    families: &mut FamilyRegistry,
    activity: PagingActivity,
    page_size: u64,
    config: &SwapConfig,
    caps: Capabilities,
) {
    if !config.report_io || !caps.io_counters {
        return;
    }

    let (family, pages_in, pages_out) = if config.report_bytes {
        (
            &mut families.io,
            activity.pages_in.wrapping_mul(page_size),
            activity.pages_out.wrapping_mul(page_size),
        )
    } else {
        (&mut families.operations, activity.pages_in, activity.pages_out)
    };

    family.append(&[], LABEL_DIRECTION, DIRECTION_IN, MetricValue::Counter(pages_in));
    family.append(&[], LABEL_DIRECTION, DIRECTION_OUT, MetricValue::Counter(pages_out));
}
