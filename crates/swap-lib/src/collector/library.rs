//! Fallback backend built on `sysinfo`
//!
//! Used on targets without a native reader. Reports one combined reading in
//! bytes; no per-device view and no paging counters.

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{RawSample, SwapReading};
use crate::plugin::SwapContext;
use sysinfo::System;

pub struct LibraryReader {
    system: System,
}

impl Default for LibraryReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryReader {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Build a reading from library totals, in bytes
    pub fn reading_from(total: u64, used: u64, free: u64) -> Result<SwapReading, CollectError> {
        if used > total {
            return Err(CollectError::Query(format!(
                "swap used ({used}) exceeds total ({total})"
            )));
        }
        Ok(SwapReading::new(None, used, free))
    }
}

impl RawReader for LibraryReader {
    const NAME: &'static str = "sysinfo";

    const CAPABILITIES: Capabilities = Capabilities {
        by_device: false,
        io_counters: false,
        report_bytes: false,
    };

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self::new())
    }

    fn collect(&mut self, _ctx: &SwapContext) -> Result<RawSample, CollectError> {
        self.system.refresh_memory();
        let reading = Self::reading_from(
            self.system.total_swap(),
            self.system.used_swap(),
            self.system.free_swap(),
        )?;

        Ok(RawSample {
            readings: vec![reading],
            paging: None,
            skipped: 0,
        })
    }
}
