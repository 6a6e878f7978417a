//! Kernel-memory backend
//!
//! A kernel-memory handle is opened once at init and asked for the swap
//! summary every cycle. Only whole-system figures are available.

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{RawSample, SwapReading};
use crate::plugin::SwapContext;

/// Whole-system swap summary, in pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapSummary {
    pub total_pages: u64,
    pub used_pages: u64,
}

/// Source of [`SwapSummary`]
pub trait SwapSummarySource: Sized {
    fn open() -> Result<Self, InitError>;

    /// Page size the summary is counted in
    fn page_size(&self) -> u64;

    fn swap_summary(&mut self) -> Result<SwapSummary, CollectError>;
}

/// Reader backed by a kernel-memory handle
pub struct KvmReader<S> {
    source: S,
}

impl<S: SwapSummarySource> KvmReader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Convert a page summary into a sample
    pub fn sample_from(summary: SwapSummary, page_size: u64) -> Result<RawSample, CollectError> {
        let inconsistent = || CollectError::InconsistentAggregate {
            total: i64::try_from(summary.total_pages).unwrap_or(i64::MAX),
            used: i64::try_from(summary.used_pages).unwrap_or(i64::MAX),
        };
        let total = i64::try_from(summary.total_pages).map_err(|_| inconsistent())?;
        let used = i64::try_from(summary.used_pages).map_err(|_| inconsistent())?;
        let reading =
            SwapReading::from_total_used(None, total, used, page_size).ok_or_else(inconsistent)?;

        Ok(RawSample {
            readings: vec![reading],
            paging: None,
            skipped: 0,
        })
    }
}

impl<S: SwapSummarySource> RawReader for KvmReader<S> {
    const NAME: &'static str = "kvm";

    const CAPABILITIES: Capabilities = Capabilities {
        by_device: false,
        io_counters: false,
        report_bytes: false,
    };

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self::new(S::open()?))
    }

    fn collect(&mut self, _ctx: &SwapContext) -> Result<RawSample, CollectError> {
        let summary = self.source.swap_summary()?;
        Self::sample_from(summary, self.source.page_size())
    }
}

#[cfg(target_os = "freebsd")]
pub(crate) mod freebsd {
    use super::{SwapSummary, SwapSummarySource};
    use crate::error::{CollectError, InitError};
    use libc::{c_char, c_int, c_uint, c_void};
    use std::ffi::CStr;
    use std::io;
    use std::mem;

    const POSIX2_LINE_MAX: usize = 2048;

    #[repr(C)]
    #[allow(non_camel_case_types, dead_code)]
    struct kvm_swap {
        ksw_devname: [c_char; 32],
        ksw_used: c_uint,
        ksw_total: c_uint,
        ksw_flags: c_int,
        ksw_reserved1: c_uint,
        ksw_reserved2: c_uint,
    }

    #[link(name = "kvm")]
    extern "C" {
        fn kvm_openfiles(
            execfile: *const c_char,
            corefile: *const c_char,
            swapfile: *const c_char,
            flags: c_int,
            errbuf: *mut c_char,
        ) -> *mut c_void;
        fn kvm_getswapinfo(
            kd: *mut c_void,
            info: *mut kvm_swap,
            maxswapinfo: c_int,
            flags: c_int,
        ) -> c_int;
        fn kvm_close(kd: *mut c_void) -> c_int;
    }

    /// Open kernel-memory handle on the running kernel
    pub struct KvmHandle {
        kd: *mut c_void,
        page_size: u64,
    }

    // SAFETY: the handle is owned by one reader and only used through
    // `&mut self`, never concurrently.
    unsafe impl Send for KvmHandle {}

    impl SwapSummarySource for KvmHandle {
        fn open() -> Result<Self, InitError> {
            let page_size = crate::collector::system_page_size()?;
            let mut errbuf = [0 as c_char; POSIX2_LINE_MAX];

            // SAFETY: the path literal is NUL-terminated and `errbuf` has the
            // size kvm_openfiles writes into.
            let kd = unsafe {
                kvm_openfiles(
                    std::ptr::null(),
                    b"/dev/null\0".as_ptr().cast::<c_char>(),
                    std::ptr::null(),
                    libc::O_RDONLY,
                    errbuf.as_mut_ptr(),
                )
            };
            if kd.is_null() {
                // SAFETY: kvm_openfiles NUL-terminates its error message.
                let message = unsafe { CStr::from_ptr(errbuf.as_ptr()) };
                return Err(InitError::Handle {
                    what: "kvm_openfiles",
                    reason: message.to_string_lossy().into_owned(),
                });
            }

            Ok(Self { kd, page_size })
        }

        fn page_size(&self) -> u64 {
            self.page_size
        }

        fn swap_summary(&mut self) -> Result<SwapSummary, CollectError> {
            // SAFETY: kvm_swap is plain data.
            let mut summary: kvm_swap = unsafe { mem::zeroed() };

            // SAFETY: `kd` is open and `summary` has room for the one entry
            // requested.
            let status = unsafe { kvm_getswapinfo(self.kd, &mut summary, 1, 0) };
            if status < 0 {
                return Err(CollectError::Syscall {
                    call: "kvm_getswapinfo",
                    source: io::Error::last_os_error(),
                });
            }

            Ok(SwapSummary {
                total_pages: u64::from(summary.ksw_total),
                used_pages: u64::from(summary.ksw_used),
            })
        }
    }

    impl Drop for KvmHandle {
        fn drop(&mut self) {
            // SAFETY: `kd` came from kvm_openfiles and is closed only here.
            unsafe {
                kvm_close(self.kd);
            }
        }
    }
}
