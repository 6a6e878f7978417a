//! Performance-counter backend
//!
//! One call returns whole-system paging-space totals plus the paging-space
//! I/O counters. There is no per-device view.

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{PagingActivity, RawSample, SwapReading};
use crate::plugin::SwapContext;

/// Paging-space figures, in pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryTotals {
    pub pgsp_total: u64,
    pub pgsp_free: u64,
    pub pgsp_rsvd: u64,
    pub pgspins: u64,
    pub pgspouts: u64,
}

/// Source of [`MemoryTotals`]
pub trait MemoryTotalsSource: Sized {
    fn open() -> Result<Self, InitError>;

    fn memory_totals(&mut self) -> Result<MemoryTotals, CollectError>;
}

/// Reader for systems exposing total paging-space counters
pub struct PerfstatReader<S> {
    source: S,
}

impl<S: MemoryTotalsSource> PerfstatReader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Convert page totals into a sample
    pub fn sample_from(totals: MemoryTotals, page_size: u64) -> Result<RawSample, CollectError> {
        let out_of_range = || CollectError::OutOfRange {
            total: totals.pgsp_total,
            free: totals.pgsp_free,
            cached: 0,
        };
        if totals.pgsp_free > totals.pgsp_total {
            return Err(out_of_range());
        }
        let bytes = |pages: u64| pages.checked_mul(page_size).ok_or_else(out_of_range);

        let used = totals.pgsp_total - totals.pgsp_free;
        let reading = SwapReading::new(None, bytes(used)?, bytes(totals.pgsp_free)?)
            .with_auxiliary("reserved", bytes(totals.pgsp_rsvd)?);

        Ok(RawSample {
            readings: vec![reading],
            paging: Some(PagingActivity {
                pages_in: totals.pgspins,
                pages_out: totals.pgspouts,
            }),
            skipped: 0,
        })
    }
}

impl<S: MemoryTotalsSource> RawReader for PerfstatReader<S> {
    const NAME: &'static str = "perfstat";

    const CAPABILITIES: Capabilities = Capabilities {
        by_device: false,
        io_counters: true,
        report_bytes: false,
    };

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self::new(S::open()?))
    }

    fn collect(&mut self, ctx: &SwapContext) -> Result<RawSample, CollectError> {
        let totals = self.source.memory_totals()?;
        Self::sample_from(totals, ctx.page_size)
    }
}

#[cfg(target_os = "aix")]
pub(crate) mod aix {
    use super::{MemoryTotals, MemoryTotalsSource};
    use crate::error::{CollectError, InitError};
    use libc::{c_int, c_void};
    use std::io;
    use std::mem;

    /// Leading fields of `perfstat_memory_total_t`, all `u_longlong_t`
    #[repr(C)]
    #[derive(Default)]
    #[allow(non_camel_case_types)]
    struct perfstat_memory_total_t {
        virt_total: u64,
        real_total: u64,
        real_free: u64,
        real_pinned: u64,
        real_inuse: u64,
        pgbad: u64,
        pgexct: u64,
        pgins: u64,
        pgouts: u64,
        pgspins: u64,
        pgspouts: u64,
        scans: u64,
        cycles: u64,
        pgsteals: u64,
        numperm: u64,
        pgsp_total: u64,
        pgsp_free: u64,
        pgsp_rsvd: u64,
        real_system: u64,
        real_user: u64,
        real_process: u64,
        virt_active: u64,
    }

    #[link(name = "perfstat")]
    extern "C" {
        fn perfstat_memory_total(
            name: *mut c_void,
            buf: *mut perfstat_memory_total_t,
            sizeof_struct: c_int,
            desired: c_int,
        ) -> c_int;
    }

    pub struct Perfstat;

    impl MemoryTotalsSource for Perfstat {
        fn open() -> Result<Self, InitError> {
            Ok(Self)
        }

        fn memory_totals(&mut self) -> Result<MemoryTotals, CollectError> {
            let mut buf = perfstat_memory_total_t::default();
            // SAFETY: `buf` is a valid, writable struct of the size we pass.
            let status = unsafe {
                perfstat_memory_total(
                    std::ptr::null_mut(),
                    &mut buf,
                    mem::size_of::<perfstat_memory_total_t>() as c_int,
                    1,
                )
            };
            if status < 0 {
                return Err(CollectError::Syscall {
                    call: "perfstat_memory_total",
                    source: io::Error::last_os_error(),
                });
            }

            Ok(MemoryTotals {
                pgsp_total: buf.pgsp_total,
                pgsp_free: buf.pgsp_free,
                pgsp_rsvd: buf.pgsp_rsvd,
                pgspins: buf.pgspins,
                pgspouts: buf.pgspouts,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwapConfig;

    struct FixedTotals(Result<MemoryTotals, ()>);

    impl MemoryTotalsSource for FixedTotals {
        fn open() -> Result<Self, InitError> {
            Ok(Self(Ok(MemoryTotals::default())))
        }

        fn memory_totals(&mut self) -> Result<MemoryTotals, CollectError> {
            self.0
                .map_err(|_| CollectError::Query("perfstat_memory_total failed".to_string()))
        }
    }

    fn context() -> SwapContext {
        SwapContext {
            page_size: 4096,
            config: SwapConfig::default(),
        }
    }

    #[test]
    fn test_totals_scaled_by_page_size() {
        let totals = MemoryTotals {
            pgsp_total: 1000,
            pgsp_free: 700,
            pgsp_rsvd: 50,
            pgspins: 11,
            pgspouts: 22,
        };
        let mut reader = PerfstatReader::new(FixedTotals(Ok(totals)));

        let sample = reader.collect(&context()).unwrap();

        assert_eq!(sample.readings.len(), 1);
        let reading = &sample.readings[0];
        assert_eq!(reading.device, None);
        assert_eq!(reading.used_bytes, 300 * 4096);
        assert_eq!(reading.free_bytes, 700 * 4096);
        let aux = reading.auxiliary.as_ref().unwrap();
        assert_eq!(aux.name, "reserved");
        assert_eq!(aux.bytes, 50 * 4096);

        let paging = sample.paging.unwrap();
        assert_eq!(paging.pages_in, 11);
        assert_eq!(paging.pages_out, 22);
    }

    #[test]
    fn test_free_above_total_is_rejected() {
        let totals = MemoryTotals {
            pgsp_total: 10,
            pgsp_free: 20,
            ..MemoryTotals::default()
        };
        let err = PerfstatReader::<FixedTotals>::sample_from(totals, 4096).unwrap_err();
        assert!(matches!(err, CollectError::OutOfRange { total: 10, free: 20, .. }));
    }

    #[test]
    fn test_pages_beyond_byte_range_are_rejected() {
        let totals = MemoryTotals {
            pgsp_total: 100,
            pgsp_free: 10,
            pgsp_rsvd: u64::MAX / 2,
            ..MemoryTotals::default()
        };
        let err = PerfstatReader::<FixedTotals>::sample_from(totals, 4096).unwrap_err();
        assert!(matches!(err, CollectError::OutOfRange { total: 100, .. }));
    }

    #[test]
    fn test_source_failure_propagates() {
        let mut reader = PerfstatReader::new(FixedTotals(Err(())));
        assert!(reader.collect(&context()).is_err());
    }

    #[test]
    fn test_capabilities() {
        type Reader = PerfstatReader<FixedTotals>;
        assert!(Reader::CAPABILITIES.io_counters);
        assert!(!Reader::CAPABILITIES.by_device);
        assert!(!Reader::CAPABILITIES.report_bytes);
    }
}
