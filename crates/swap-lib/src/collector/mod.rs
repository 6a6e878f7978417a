//! Swap statistics collection from the host OS
//!
//! Exactly one reader is compiled in as [`PlatformReader`]:
//!
//! | Target                | Reader              | Source                          |
//! |-----------------------|---------------------|---------------------------------|
//! | Linux, Android        | [`ProcfsReader`]    | `/proc/swaps`, `/proc/meminfo`, `/proc/vmstat` |
//! | macOS, iOS            | `SysctlReader`      | `sysctl(VM_SWAPUSAGE)`          |
//! | Solaris, illumos      | [`EnumerationReader`] | `swapctl(SC_GETNSWP/SC_LIST)` |
//! | OpenBSD               | [`EnumerationReader`] | `swapctl(SWAP_NSWAP/SWAP_STATS)` |
//! | NetBSD                | [`EnumerationReader`] | as OpenBSD, plus `sysctl(VM_UVMEXP2)` |
//! | FreeBSD               | [`KvmReader`]       | `kvm_getswapinfo`               |
//! | AIX                   | [`PerfstatReader`]  | `perfstat_memory_total`         |
//! | everything else       | [`LibraryReader`]   | `sysinfo`                       |
//!
//! The enumeration, kernel-memory, performance-counter and library readers
//! are built on every target so their aggregation logic can be tested
//! against fake tables.

mod kvm;
mod library;
mod r#loop;
mod perfstat;
mod procfs;
mod swapctl;
#[cfg(any(target_os = "macos", target_os = "ios"))]
mod sysctl;


pub use kvm::{KvmReader, SwapSummary, SwapSummarySource};
pub use library::LibraryReader;
pub use perfstat::{MemoryTotals, MemoryTotalsSource, PerfstatReader};
pub use procfs::ProcfsReader;
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder};
pub use swapctl::{CountPolicy, EnumerationReader, SwapEntry, SwapTable};
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub use sysctl::SysctlReader;

use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::RawSample;
use crate::plugin::SwapContext;

/// Contract every platform backend satisfies
pub trait RawReader: Sized {
    /// Short backend name for logs
    const NAME: &'static str;

    /// What this backend can report
    const CAPABILITIES: Capabilities;

    /// Acquire any long-lived handle. Called once before the first cycle.
    fn open(ctx: &SwapContext) -> Result<Self, InitError>;

    /// Read the current swap figures
    fn collect(&mut self, ctx: &SwapContext) -> Result<RawSample, CollectError>;
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub type PlatformReader = ProcfsReader;

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub type PlatformReader = SysctlReader;

#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub type PlatformReader = EnumerationReader<swapctl::solaris::SolarisSwapTable>;

#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
pub type PlatformReader = EnumerationReader<swapctl::bsd::BsdSwapTable>;

#[cfg(target_os = "freebsd")]
pub type PlatformReader = KvmReader<kvm::freebsd::KvmHandle>;

#[cfg(target_os = "aix")]
pub type PlatformReader = PerfstatReader<perfstat::aix::Perfstat>;

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "freebsd",
    target_os = "aix"
)))]
pub type PlatformReader = LibraryReader;

/// Query the system page size
#[cfg(unix)]
pub fn system_page_size() -> Result<u64, InitError> {
    // SAFETY: sysconf has no preconditions and does not touch caller memory.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        return Err(InitError::PageSize);
    }
    Ok(size as u64)
}

/// Query the system page size
#[cfg(not(unix))]
pub fn system_page_size() -> Result<u64, InitError> {
    // Only the library reader runs here and it reports bytes directly.
    Ok(4096)
}
