//! Two-phase swap area enumeration
//!
//! Kernels with a `swapctl` call report swap in two steps: first the number
//! of configured areas, then a table with one entry per area. This module
//! owns everything above the raw system call: the count-mismatch policy,
//! skipping areas that are being removed, and folding the table into either
//! one combined reading or one reading per device. Some kernels also expose
//! paging counters next to the table; those are read after the table.

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{PagingActivity, RawSample, SwapReading};
use crate::plugin::SwapContext;
use tracing::{debug, warn};

/// One swap area as reported by the kernel, in table units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapEntry {
    pub path: String,
    pub total: i64,
    pub used: i64,
    /// False when the area is being removed or not enabled
    pub active: bool,
}

/// How to treat a table whose length differs from the announced count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Fewer entries are fine, more entries are an error
    TruncateShort,
    /// Any difference is an error
    Exact,
}

/// Raw access to the kernel swap table
pub trait SwapTable: Sized {
    const NAME: &'static str;
    const POLICY: CountPolicy;

    /// Whether [`SwapTable::paging`] returns counters
    const PAGING: bool = false;

    /// Bytes per table unit
    fn unit_size(page_size: u64) -> u64;

    fn open() -> Result<Self, InitError>;

    /// Number of configured swap areas
    fn count(&mut self) -> Result<usize, CollectError>;

    /// Fetch a table sized for `capacity` areas.
    /// Returns the count the kernel reported and the entries it filled in.
    fn list(&mut self, capacity: usize) -> Result<(usize, Vec<SwapEntry>), CollectError>;

    /// Pages swapped in and out since boot
    fn paging(&mut self) -> Result<Option<PagingActivity>, CollectError> {
        Ok(None)
    }
}

/// Reader for `swapctl`-style kernels
pub struct EnumerationReader<T> {
    table: T,
}

impl<T: SwapTable> EnumerationReader<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Number of usable entries under `policy`
    pub fn check_count(
        policy: CountPolicy,
        requested: usize,
        returned: usize,
    ) -> Result<usize, CollectError> {
        let ok = match policy {
            CountPolicy::TruncateShort => returned <= requested,
            CountPolicy::Exact => returned == requested,
        };
        if !ok {
            return Err(CollectError::CountMismatch {
                requested,
                returned,
            });
        }
        Ok(returned)
    }

    /// Fold table entries into readings
    ///
    /// Combined mode sums every active area and fails if the sum is
    /// inconsistent. Per-device mode emits one reading per active area and
    /// skips areas whose own figures are inconsistent.
    pub fn aggregate(
        entries: &[SwapEntry],
        by_device: bool,
        unit: u64,
    ) -> Result<RawSample, CollectError> {
        let mut sample = RawSample::default();
        let mut total = 0i64;
        let mut used = 0i64;

        for entry in entries.iter().filter(|e| e.active) {
            if !by_device {
                total = total.saturating_add(entry.total);
                used = used.saturating_add(entry.used);
                continue;
            }

            let path = Some(entry.path.clone());
            match SwapReading::from_total_used(path, entry.total, entry.used, unit) {
                Some(reading) => sample.readings.push(reading),
                None => {
                    debug!(
                        path = %entry.path,
                        total = entry.total,
                        used = entry.used,
                        "Skipping inconsistent swap area"
                    );
                    sample.skipped += 1;
                }
            }
        }

        if !by_device {
            let reading = SwapReading::from_total_used(None, total, used, unit)
                .ok_or(CollectError::InconsistentAggregate { total, used })?;
            sample.readings.push(reading);
        }

        Ok(sample)
    }
}

impl<T: SwapTable> RawReader for EnumerationReader<T> {
    const NAME: &'static str = T::NAME;

    const CAPABILITIES: Capabilities = Capabilities {
        by_device: true,
        io_counters: T::PAGING,
        report_bytes: T::PAGING,
    };

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self::new(T::open()?))
    }

    fn collect(&mut self, ctx: &SwapContext) -> Result<RawSample, CollectError> {
        let requested = self.table.count()?;
        if requested == 0 {
            return Ok(RawSample::default());
        }

        let (returned, mut entries) = self.table.list(requested)?;
        let usable = Self::check_count(T::POLICY, requested, returned)?;
        entries.truncate(usable);

        let mut sample = Self::aggregate(
            &entries,
            ctx.config.report_by_device,
            T::unit_size(ctx.page_size),
        )?;

        if ctx.config.report_io && T::PAGING {
            match self.table.paging() {
                Ok(paging) => sample.paging = paging,
                Err(e) => warn!(error = %e, "Failed to read paging counters"),
            }
        }

        Ok(sample)
    }
}

/// illumos / Solaris: `swapctl(SC_GETNSWP)` then `swapctl(SC_LIST)`, sizes in pages
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub(crate) mod solaris {
    use super::{CountPolicy, SwapEntry, SwapTable};
    use crate::error::{CollectError, InitError};
    use libc::{c_char, c_int, c_long, c_void, off_t};
    use std::ffi::CStr;
    use std::io;
    use std::mem;

    const SC_LIST: c_int = 2;
    const SC_GETNSWP: c_int = 4;
    const ST_INDEL: c_int = 0x01;
    const PATH_MAX: usize = 1024;

    #[repr(C)]
    #[allow(non_camel_case_types)]
    struct swapent {
        ste_path: *mut c_char,
        ste_start: off_t,
        ste_length: off_t,
        ste_pages: c_long,
        ste_free: c_long,
        ste_flags: c_int,
    }

    extern "C" {
        fn swapctl(cmd: c_int, arg: *mut c_void) -> c_int;
    }

    pub struct SolarisSwapTable;

    impl SwapTable for SolarisSwapTable {
        const NAME: &'static str = "swapctl";
        const POLICY: CountPolicy = CountPolicy::TruncateShort;

        fn unit_size(page_size: u64) -> u64 {
            page_size
        }

        fn open() -> Result<Self, InitError> {
            Ok(Self)
        }

        fn count(&mut self) -> Result<usize, CollectError> {
            // SAFETY: SC_GETNSWP ignores its argument.
            let n = unsafe { swapctl(SC_GETNSWP, std::ptr::null_mut()) };
            if n < 0 {
                return Err(CollectError::Syscall {
                    call: "swapctl(SC_GETNSWP)",
                    source: io::Error::last_os_error(),
                });
            }
            Ok(n as usize)
        }

        fn list(&mut self, capacity: usize) -> Result<(usize, Vec<SwapEntry>), CollectError> {
            // swaptbl_t is an int count followed by the entries; one spare
            // entry covers the header.
            let offset = mem::size_of::<c_int>().next_multiple_of(mem::align_of::<swapent>());
            let mut table: Vec<swapent> = (0..=capacity)
                // SAFETY: swapent is plain data; a null path pointer is valid until set.
                .map(|_| unsafe { mem::zeroed() })
                .collect();
            let mut paths = vec![0 as c_char; capacity * PATH_MAX];

            // SAFETY: the buffer holds the header plus `capacity` entries, each
            // entry's path points at its own PATH_MAX slice of `paths`, and both
            // buffers outlive the call.
            unsafe {
                let base = table.as_mut_ptr().cast::<u8>();
                *base.cast::<c_int>() = capacity as c_int;
                let entries = base.add(offset).cast::<swapent>();
                for i in 0..capacity {
                    (*entries.add(i)).ste_path = paths.as_mut_ptr().add(i * PATH_MAX);
                }

                let status = swapctl(SC_LIST, base.cast::<c_void>());
                if status < 0 {
                    return Err(CollectError::Syscall {
                        call: "swapctl(SC_LIST)",
                        source: io::Error::last_os_error(),
                    });
                }

                let returned = status as usize;
                let filled = std::slice::from_raw_parts(entries, returned.min(capacity));
                let entries = filled
                    .iter()
                    .map(|e| SwapEntry {
                        path: CStr::from_ptr(e.ste_path).to_string_lossy().into_owned(),
                        total: e.ste_pages as i64,
                        used: (e.ste_pages - e.ste_free) as i64,
                        active: e.ste_flags & ST_INDEL == 0,
                    })
                    .collect();
                Ok((returned, entries))
            }
        }
    }
}

/// OpenBSD and NetBSD: `swapctl(SWAP_NSWAP)` then `swapctl(SWAP_STATS)`,
/// sizes in 512-byte blocks. NetBSD adds paging counters from `vm.uvmexp2`.
#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
pub(crate) mod bsd {
    use super::{CountPolicy, SwapEntry, SwapTable};
    use crate::error::{CollectError, InitError};
    #[cfg(target_os = "netbsd")]
    use crate::models::PagingActivity;
    use libc::{c_char, c_int, c_void, dev_t};
    use std::ffi::CStr;
    use std::io;
    use std::mem;

    const SWAP_NSWAP: c_int = 3;
    #[cfg(target_os = "openbsd")]
    const SWAP_STATS: c_int = 4;
    #[cfg(target_os = "netbsd")]
    const SWAP_STATS: c_int = 10;
    const SWF_ENABLE: c_int = 0x0000_0002;
    #[cfg(target_os = "openbsd")]
    const PATH_LEN: usize = 1024;
    #[cfg(target_os = "netbsd")]
    const PATH_LEN: usize = 1024 + 1;
    const DEV_BSIZE: u64 = 512;

    #[repr(C)]
    #[allow(non_camel_case_types)]
    struct swapent {
        se_dev: dev_t,
        se_flags: c_int,
        se_nblks: c_int,
        se_inuse: c_int,
        se_priority: c_int,
        se_path: [c_char; PATH_LEN],
    }

    extern "C" {
        fn swapctl(cmd: c_int, arg: *mut c_void, misc: c_int) -> c_int;
    }

    pub struct BsdSwapTable;

    impl SwapTable for BsdSwapTable {
        const NAME: &'static str = "swapctl";
        const POLICY: CountPolicy = CountPolicy::Exact;
        const PAGING: bool = cfg!(target_os = "netbsd");

        fn unit_size(_page_size: u64) -> u64 {
            DEV_BSIZE
        }

        fn open() -> Result<Self, InitError> {
            Ok(Self)
        }

        fn count(&mut self) -> Result<usize, CollectError> {
            // SAFETY: SWAP_NSWAP ignores its pointer and size arguments.
            let n = unsafe { swapctl(SWAP_NSWAP, std::ptr::null_mut(), 0) };
            if n < 0 {
                return Err(CollectError::Syscall {
                    call: "swapctl(SWAP_NSWAP)",
                    source: io::Error::last_os_error(),
                });
            }
            Ok(n as usize)
        }

        fn list(&mut self, capacity: usize) -> Result<(usize, Vec<SwapEntry>), CollectError> {
            let mut table: Vec<swapent> = (0..capacity)
                // SAFETY: swapent is plain data.
                .map(|_| unsafe { mem::zeroed() })
                .collect();

            // SAFETY: `table` has room for exactly `capacity` entries.
            let status = unsafe {
                swapctl(
                    SWAP_STATS,
                    table.as_mut_ptr().cast::<c_void>(),
                    capacity as c_int,
                )
            };
            if status < 0 {
                return Err(CollectError::Syscall {
                    call: "swapctl(SWAP_STATS)",
                    source: io::Error::last_os_error(),
                });
            }

            let returned = status as usize;
            let entries = table
                .iter()
                .take(returned)
                .map(|e| SwapEntry {
                    // SAFETY: the kernel NUL-terminates se_path.
                    path: unsafe { CStr::from_ptr(e.se_path.as_ptr()) }
                        .to_string_lossy()
                        .into_owned(),
                    total: i64::from(e.se_nblks),
                    used: i64::from(e.se_inuse),
                    active: e.se_flags & SWF_ENABLE != 0,
                })
                .collect();
            Ok((returned, entries))
        }

        #[cfg(target_os = "netbsd")]
        fn paging(&mut self) -> Result<Option<PagingActivity>, CollectError> {
            uvm::paging().map(Some)
        }
    }

    /// `vm.uvmexp2`, the fixed-width export of the UVM counters
    #[cfg(target_os = "netbsd")]
    mod uvm {
        use crate::error::CollectError;
        use crate::models::PagingActivity;
        use libc::{c_int, c_void};
        use std::io;
        use std::mem;

        const VM_UVMEXP2: c_int = 5;

        /// Leading fields of `struct uvmexp_sysctl`, all `int64_t`. The
        /// trailing pad leaves room for fields added by newer kernels.
        #[repr(C)]
        #[allow(non_camel_case_types, dead_code)]
        struct uvmexp_sysctl {
            pagesize: i64,
            pagemask: i64,
            pageshift: i64,
            npages: i64,
            free: i64,
            active: i64,
            inactive: i64,
            paging: i64,
            wired: i64,
            zeropages: i64,
            reserve_pagedaemon: i64,
            reserve_kernel: i64,
            freemin: i64,
            freetarg: i64,
            inactarg: i64,
            wiredmax: i64,
            nswapdev: i64,
            swpages: i64,
            swpginuse: i64,
            swpgonly: i64,
            nswget: i64,
            unused1: i64,
            cpuhit: i64,
            cpumiss: i64,
            faults: i64,
            traps: i64,
            intrs: i64,
            swtch: i64,
            softs: i64,
            syscalls: i64,
            pageins: i64,
            swapins: i64,
            swapouts: i64,
            pgswapin: i64,
            pgswapout: i64,
            rest: [i64; 128],
        }

        pub(super) fn paging() -> Result<PagingActivity, CollectError> {
            let mib = [libc::CTL_VM, VM_UVMEXP2];
            // SAFETY: uvmexp_sysctl is plain data.
            let mut uvmexp: uvmexp_sysctl = unsafe { mem::zeroed() };
            let mut size = mem::size_of::<uvmexp_sysctl>();

            // SAFETY: `uvmexp` is writable for `size` bytes and `mib` names
            // a two-level node.
            let status = unsafe {
                libc::sysctl(
                    mib.as_ptr(),
                    mib.len() as libc::c_uint,
                    (&mut uvmexp as *mut uvmexp_sysctl).cast::<c_void>(),
                    &mut size,
                    std::ptr::null(),
                    0,
                )
            };
            if status != 0 {
                return Err(CollectError::Syscall {
                    call: "sysctl(VM_UVMEXP2)",
                    source: io::Error::last_os_error(),
                });
            }

            Ok(PagingActivity {
                pages_in: uvmexp.pgswapin.max(0) as u64,
                pages_out: uvmexp.pgswapout.max(0) as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwapConfig;

    /// Fake kernel table
    struct FakeTable {
        count: usize,
        returned: usize,
        entries: Vec<SwapEntry>,
    }

    impl SwapTable for FakeTable {
        const NAME: &'static str = "fake";
        const POLICY: CountPolicy = CountPolicy::TruncateShort;

        fn unit_size(page_size: u64) -> u64 {
            page_size
        }

        fn open() -> Result<Self, InitError> {
            Ok(Self {
                count: 0,
                returned: 0,
                entries: Vec::new(),
            })
        }

        fn count(&mut self) -> Result<usize, CollectError> {
            Ok(self.count)
        }

        fn list(&mut self, capacity: usize) -> Result<(usize, Vec<SwapEntry>), CollectError> {
            let entries = self.entries.iter().take(capacity).cloned().collect();
            Ok((self.returned, entries))
        }
    }

    /// Fake kernel table that also exports paging counters
    struct PagedTable {
        entries: Vec<SwapEntry>,
        paging: Result<PagingActivity, ()>,
    }

    impl SwapTable for PagedTable {
        const NAME: &'static str = "fake-paged";
        const POLICY: CountPolicy = CountPolicy::Exact;
        const PAGING: bool = true;

        fn unit_size(_page_size: u64) -> u64 {
            512
        }

        fn open() -> Result<Self, InitError> {
            Ok(Self {
                entries: Vec::new(),
                paging: Ok(PagingActivity {
                    pages_in: 0,
                    pages_out: 0,
                }),
            })
        }

        fn count(&mut self) -> Result<usize, CollectError> {
            Ok(self.entries.len())
        }

        fn list(&mut self, _capacity: usize) -> Result<(usize, Vec<SwapEntry>), CollectError> {
            Ok((self.entries.len(), self.entries.clone()))
        }

        fn paging(&mut self) -> Result<Option<PagingActivity>, CollectError> {
            self.paging
                .map(Some)
                .map_err(|_| CollectError::Query("sysctl(VM_UVMEXP2) failed".to_string()))
        }
    }

    fn entry(path: &str, total: i64, used: i64) -> SwapEntry {
        SwapEntry {
            path: path.to_string(),
            total,
            used,
            active: true,
        }
    }

    fn context(by_device: bool) -> SwapContext {
        SwapContext {
            page_size: 4096,
            config: SwapConfig {
                report_by_device: by_device,
                ..SwapConfig::default()
            },
        }
    }

    fn reader(
        count: usize,
        returned: usize,
        entries: Vec<SwapEntry>,
    ) -> EnumerationReader<FakeTable> {
        EnumerationReader::new(FakeTable {
            count,
            returned,
            entries,
        })
    }

    #[test]
    fn test_combined_sums_active_areas() {
        let mut removed = entry("/dev/dsk/c0t1d0s1", 1000, 10);
        removed.active = false;
        let mut reader = reader(
            3,
            3,
            vec![entry("/dev/dsk/c0t0d0s1", 100, 40), removed, entry("/swapfile", 50, 10)],
        );

        let sample = reader.collect(&context(false)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        let combined = &sample.readings[0];
        assert_eq!(combined.device, None);
        assert_eq!(combined.used_bytes, 50 * 4096);
        assert_eq!(combined.free_bytes, 100 * 4096);
    }

    #[test]
    fn test_by_device_skips_inconsistent_areas() {
        let mut reader = reader(
            2,
            2,
            vec![entry("/dev/dsk/c0t0d0s1", 100, 40), entry("/broken", 10, 20)],
        );

        let sample = reader.collect(&context(true)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        assert_eq!(sample.readings[0].device.as_deref(), Some("/dev/dsk/c0t0d0s1"));
        assert_eq!(sample.readings[0].used_bytes, 40 * 4096);
        assert_eq!(sample.readings[0].free_bytes, 60 * 4096);
        assert_eq!(sample.skipped, 1);
    }

    #[test]
    fn test_combined_inconsistent_aggregate_aborts() {
        let mut reader = reader(2, 2, vec![entry("/a", 100, 90), entry("/b", 10, 30)]);

        let err = reader.collect(&context(false)).unwrap_err();

        assert!(matches!(
            err,
            CollectError::InconsistentAggregate {
                total: 110,
                used: 120
            }
        ));
    }

    #[test]
    fn test_no_areas_yields_empty_sample() {
        let mut reader = reader(0, 0, Vec::new());
        let sample = reader.collect(&context(false)).unwrap();
        assert!(sample.readings.is_empty());
    }

    #[test]
    fn test_short_table_is_truncated() {
        let mut reader = reader(3, 1, vec![entry("/a", 100, 10), entry("/b", 100, 10)]);

        let sample = reader.collect(&context(true)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        assert_eq!(sample.readings[0].device.as_deref(), Some("/a"));
    }

    #[test]
    fn test_long_table_is_rejected() {
        let mut reader = reader(1, 2, vec![entry("/a", 100, 10)]);

        let err = reader.collect(&context(false)).unwrap_err();

        assert!(matches!(
            err,
            CollectError::CountMismatch {
                requested: 1,
                returned: 2
            }
        ));
    }

    #[test]
    fn test_exact_policy() {
        type Reader = EnumerationReader<FakeTable>;
        assert_eq!(Reader::check_count(CountPolicy::Exact, 2, 2).unwrap(), 2);
        assert!(Reader::check_count(CountPolicy::Exact, 2, 1).is_err());
        assert!(Reader::check_count(CountPolicy::Exact, 2, 3).is_err());
        assert_eq!(Reader::check_count(CountPolicy::TruncateShort, 2, 1).unwrap(), 1);
    }

    #[test]
    fn test_capabilities_follow_table_paging() {
        let plain = EnumerationReader::<FakeTable>::CAPABILITIES;
        assert!(plain.by_device);
        assert!(!plain.io_counters);
        assert!(!plain.report_bytes);

        let paged = EnumerationReader::<PagedTable>::CAPABILITIES;
        assert_eq!(paged, Capabilities::ALL);
    }

    #[test]
    fn test_paging_counters_read_after_table() {
        let mut reader = EnumerationReader::new(PagedTable {
            entries: vec![entry("/dev/wd0b", 8192, 1024)],
            paging: Ok(PagingActivity {
                pages_in: 31,
                pages_out: 47,
            }),
        });

        let sample = reader.collect(&context(true)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        assert_eq!(sample.readings[0].used_bytes, 1024 * 512);
        assert_eq!(sample.readings[0].free_bytes, 7168 * 512);
        assert_eq!(
            sample.paging,
            Some(PagingActivity {
                pages_in: 31,
                pages_out: 47
            })
        );
    }

    #[test]
    fn test_paging_failure_keeps_usage() {
        let mut reader = EnumerationReader::new(PagedTable {
            entries: vec![entry("/dev/wd0b", 8192, 1024)],
            paging: Err(()),
        });

        let sample = reader.collect(&context(false)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        assert!(sample.paging.is_none());
    }

    #[test]
    fn test_paging_skipped_when_io_disabled() {
        let mut reader = EnumerationReader::new(PagedTable {
            entries: vec![entry("/dev/wd0b", 8192, 1024)],
            paging: Ok(PagingActivity {
                pages_in: 1,
                pages_out: 2,
            }),
        });
        let mut ctx = context(false);
        ctx.config.report_io = false;

        let sample = reader.collect(&ctx).unwrap();

        assert!(sample.paging.is_none());
    }

    #[test]
    fn test_by_device_skips_areas_beyond_byte_range() {
        let mut reader = reader(
            2,
            2,
            vec![entry("/a", 100, 10), entry("/huge", i64::MAX, 1)],
        );

        let sample = reader.collect(&context(true)).unwrap();

        assert_eq!(sample.readings.len(), 1);
        assert_eq!(sample.readings[0].device.as_deref(), Some("/a"));
        assert_eq!(sample.skipped, 1);
    }
}
