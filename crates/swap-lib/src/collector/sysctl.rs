//! Darwin backend: `sysctl(CTL_VM, VM_SWAPUSAGE)`

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{RawSample, SwapReading};
use crate::plugin::SwapContext;
use std::io;
use std::mem;

pub struct SysctlReader;

impl SysctlReader {
    fn swap_usage() -> Result<libc::xsw_usage, CollectError> {
        let mut mib = [libc::CTL_VM, libc::VM_SWAPUSAGE];
        // SAFETY: xsw_usage is plain data.
        let mut usage: libc::xsw_usage = unsafe { mem::zeroed() };
        let mut size = mem::size_of::<libc::xsw_usage>();

        // SAFETY: `usage` and `size` describe a writable buffer of the right size.
        let status = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as libc::c_uint,
                (&mut usage as *mut libc::xsw_usage).cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            )
        };
        if status != 0 {
            return Err(CollectError::Syscall {
                call: "sysctl(VM_SWAPUSAGE)",
                source: io::Error::last_os_error(),
            });
        }
        Ok(usage)
    }
}

impl RawReader for SysctlReader {
    const NAME: &'static str = "sysctl";

    const CAPABILITIES: Capabilities = Capabilities {
        by_device: false,
        io_counters: false,
        report_bytes: false,
    };

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self)
    }

    fn collect(&mut self, _ctx: &SwapContext) -> Result<RawSample, CollectError> {
        let usage = Self::swap_usage()?;
        Ok(RawSample {
            readings: vec![SwapReading::new(None, usage.xsu_used, usage.xsu_avail)],
            paging: None,
            skipped: 0,
        })
    }
}
