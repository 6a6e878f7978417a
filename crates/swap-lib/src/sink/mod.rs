//! Destinations for dispatched metric families
//!
//! A sink receives one populated family at a time. Sinks never see empty
//! families and must not keep references past the call; the registry clears
//! each family right after dispatch.

mod exposition;
mod json;

pub use self::exposition::{exposition_name, PrometheusSink, SwapFamilyCollector};
pub use self::json::JsonSink;

use crate::error::DispatchError;
use crate::metrics::MetricFamily;

/// Trait for metric transport implementations
pub trait MetricSink {
    /// Accept one populated family
    fn dispatch(&mut self, family: &MetricFamily) -> Result<(), DispatchError>;

    /// Called once after every cycle, whether or not anything was dispatched
    fn end_cycle(&mut self) {}
}

impl<S: MetricSink + ?Sized> MetricSink for Box<S> {
    fn dispatch(&mut self, family: &MetricFamily) -> Result<(), DispatchError> {
        (**self).dispatch(family)
    }

    fn end_cycle(&mut self) {
        (**self).end_cycle()
    }
}
