//! Linux swap collection from procfs
//!
//! Reads:
//! - /proc/swaps for per-device usage (ReportByDevice)
//! - /proc/meminfo for the combined view, including SwapCached
//! - /proc/vmstat for pswpin/pswpout paging counters

use super::RawReader;
use crate::config::Capabilities;
use crate::error::{CollectError, InitError};
use crate::models::{PagingActivity, RawSample, SwapReading};
use crate::plugin::SwapContext;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// procfs reports sizes in KiB
const KIB: u64 = 1024;

/// Collector for Linux procfs
pub struct ProcfsReader {
    proc_path: PathBuf,
}

impl Default for ProcfsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcfsReader {
    /// Create a reader for the real /proc
    pub fn new() -> Self {
        Self {
            proc_path: PathBuf::from("/proc"),
        }
    }

    /// Create reader with custom proc path (for testing)
    pub fn with_proc_path(proc_path: impl Into<PathBuf>) -> Self {
        Self {
            proc_path: proc_path.into(),
        }
    }

    fn read(&self, name: &str) -> Result<String, CollectError> {
        let path = self.proc_path.join(name);
        fs::read_to_string(&path).map_err(|source| CollectError::Read { path, source })
    }

    /// Parse /proc/swaps contents
    /// Returns the valid per-device readings and the number of rows skipped
    ///
    /// Rows must have exactly five fields (`Filename Type Size Used Priority`).
    /// Rows with non-numeric sizes or used > size are skipped.
    pub fn parse_swaps(content: &str) -> (Vec<SwapReading>, usize) {
        let mut readings = Vec::new();
        let mut skipped = 0usize;

        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() || fields[0] == "Filename" {
                continue;
            }
            if fields.len() != 5 {
                skipped += 1;
                continue;
            }

            let (Ok(total), Ok(used)) = (fields[2].parse::<i64>(), fields[3].parse::<i64>())
            else {
                skipped += 1;
                continue;
            };

            match SwapReading::from_total_used(Some(fields[0].to_string()), total, used, KIB) {
                Some(reading) => readings.push(reading),
                None => skipped += 1,
            }
        }

        (readings, skipped)
    }

    /// Parse /proc/meminfo contents into the combined reading
    ///
    /// used = SwapTotal - (SwapFree + SwapCached). Kernels without SwapCached
    /// (OpenVZ, for example) fall back to SwapTotal - SwapFree.
    pub fn parse_meminfo(content: &str) -> Result<SwapReading, CollectError> {
        let mut total = None;
        let mut free = None;
        let mut cached = None;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 2 {
                continue;
            }

            let slot = if parts[0].eq_ignore_ascii_case("SwapTotal:") {
                &mut total
            } else if parts[0].eq_ignore_ascii_case("SwapFree:") {
                &mut free
            } else if parts[0].eq_ignore_ascii_case("SwapCached:") {
                &mut cached
            } else {
                continue;
            };

            if let Ok(value) = parts[1].parse::<u64>() {
                *slot = Some(value);
            }
        }

        let missing = |field: &'static str| CollectError::MissingField {
            source_name: "/proc/meminfo",
            field,
        };
        let total = total.ok_or_else(|| missing("SwapTotal"))?;
        let free = free.ok_or_else(|| missing("SwapFree"))?;

        let out_of_range = || CollectError::OutOfRange {
            total,
            free,
            cached: cached.unwrap_or(0),
        };
        let deducted = free
            .checked_add(cached.unwrap_or(0))
            .filter(|deducted| *deducted <= total)
            .ok_or_else(out_of_range)?;
        // Checking the total covers used, free and cached, all bounded by it
        total.checked_mul(KIB).ok_or_else(out_of_range)?;
        let used = total - deducted;

        let reading = SwapReading::new(None, used * KIB, free * KIB);
        Ok(match cached {
            Some(cached) => reading.with_auxiliary("cached", cached * KIB),
            None => reading,
        })
    }

    /// Parse /proc/vmstat contents
    /// Returns the pswpin/pswpout page counters
    pub fn parse_vmstat(content: &str) -> Result<PagingActivity, CollectError> {
        let mut pages_in = None;
        let mut pages_out = None;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 2 {
                continue;
            }
            if parts[0].eq_ignore_ascii_case("pswpin") {
                pages_in = parts[1].parse::<u64>().ok();
            } else if parts[0].eq_ignore_ascii_case("pswpout") {
                pages_out = parts[1].parse::<u64>().ok();
            }
        }

        let missing = |field: &'static str| CollectError::MissingField {
            source_name: "/proc/vmstat",
            field,
        };
        Ok(PagingActivity {
            pages_in: pages_in.ok_or_else(|| missing("pswpin"))?,
            pages_out: pages_out.ok_or_else(|| missing("pswpout"))?,
        })
    }
}

impl RawReader for ProcfsReader {
    const NAME: &'static str = "procfs";

    const CAPABILITIES: Capabilities = Capabilities::ALL;

    fn open(_ctx: &SwapContext) -> Result<Self, InitError> {
        Ok(Self::new())
    }

    fn collect(&mut self, ctx: &SwapContext) -> Result<RawSample, CollectError> {
        let mut sample = RawSample::default();

        if ctx.config.report_by_device {
            let content = self.read("swaps")?;
            let (readings, skipped) = Self::parse_swaps(&content);
            if skipped > 0 {
                debug!(skipped, "Skipped malformed rows in /proc/swaps");
            }
            sample.readings = readings;
            sample.skipped = skipped;
        } else {
            let content = self.read("meminfo")?;
            sample.readings.push(Self::parse_meminfo(&content)?);
        }

        if ctx.config.report_io {
            match self.read("vmstat").and_then(|c| Self::parse_vmstat(&c)) {
                Ok(activity) => sample.paging = Some(activity),
                Err(e) => warn!(error = %e, "Failed to read paging counters"),
            }
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPS: &str = "Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/dev/sda2                               partition\t2097152\t\t512000\t\t-1
/swapfile                               file\t\t1048576\t\t0\t\t-2
";

    #[test]
    fn test_parse_swaps() {
        let (readings, skipped) = ProcfsReader::parse_swaps(SWAPS);

        assert_eq!(skipped, 0);
        assert_eq!(readings.len(), 2);

        assert_eq!(readings[0].device.as_deref(), Some("/dev/sda2"));
        assert_eq!(readings[0].used_bytes, 524288000);
        assert_eq!(readings[0].free_bytes, (2097152 - 512000) * 1024);

        assert_eq!(readings[1].device.as_deref(), Some("/swapfile"));
        assert_eq!(readings[1].used_bytes, 0);
        assert_eq!(readings[1].free_bytes, 1048576 * 1024);
    }

    #[test]
    fn test_parse_swaps_skips_malformed_rows() {
        let content = "Filename Type Size Used Priority
/dev/sda2 partition 2097152 512000 -1
/dev/sdb1 partition 100 200 -2
/dev/sdc1 partition abc 10 -3
/dev/sdd1 partition 100 10
/dev/sde1 partition 100 10 -4 extra
/dev/sdf1 partition 100 -5 -5
/dev/sdg1 partition 9223372036854775807 1 -6
";
        let (readings, skipped) = ProcfsReader::parse_swaps(content);

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].device.as_deref(), Some("/dev/sda2"));
        assert_eq!(skipped, 6);
    }

    #[test]
    fn test_parse_swaps_header_only() {
        let (readings, skipped) = ProcfsReader::parse_swaps("Filename Type Size Used Priority\n");
        assert!(readings.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn test_parse_meminfo_with_cached() {
        let content = "MemTotal:       32499764 kB
SwapCached:         1024 kB
SwapTotal:      25165820 kB
SwapFree:       20000000 kB
";
        let reading = ProcfsReader::parse_meminfo(content).unwrap();

        assert_eq!(reading.device, None);
        assert_eq!(reading.used_bytes, (25165820 - 20000000 - 1024) * 1024);
        assert_eq!(reading.free_bytes, 20000000 * 1024);
        let aux = reading.auxiliary.as_ref().unwrap();
        assert_eq!(aux.name, "cached");
        assert_eq!(aux.bytes, 1024 * 1024);
        assert_eq!(reading.total_bytes(), 25165820 * 1024);
    }

    #[test]
    fn test_parse_meminfo_without_cached() {
        let content = "SwapTotal: 1000 kB\nSwapFree: 400 kB\n";
        let reading = ProcfsReader::parse_meminfo(content).unwrap();

        assert_eq!(reading.used_bytes, 600 * 1024);
        assert_eq!(reading.free_bytes, 400 * 1024);
        assert!(reading.auxiliary.is_none());
    }

    #[test]
    fn test_parse_meminfo_missing_total() {
        let err = ProcfsReader::parse_meminfo("SwapFree: 400 kB\nSwapCached: 0 kB\n").unwrap_err();
        assert!(matches!(
            err,
            CollectError::MissingField {
                field: "SwapTotal",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_meminfo_negative_used() {
        let content = "SwapTotal: 1000 kB\nSwapFree: 900 kB\nSwapCached: 200 kB\n";
        let err = ProcfsReader::parse_meminfo(content).unwrap_err();
        assert!(matches!(err, CollectError::OutOfRange { total: 1000, .. }));
    }

    #[test]
    fn test_parse_meminfo_total_exceeds_byte_range() {
        let content = "SwapTotal: 18446744073709551615 kB\nSwapFree: 18446744073709551615 kB\n";
        let err = ProcfsReader::parse_meminfo(content).unwrap_err();
        assert!(matches!(err, CollectError::OutOfRange { .. }));
    }

    #[test]
    fn test_parse_meminfo_free_plus_cached_overflows() {
        let content = "SwapTotal: 10 kB\nSwapFree: 18446744073709551615 kB\nSwapCached: 1 kB\n";
        let err = ProcfsReader::parse_meminfo(content).unwrap_err();
        assert!(matches!(
            err,
            CollectError::OutOfRange {
                total: 10,
                cached: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_vmstat() {
        let content = "nr_free_pages 123\npswpin 77\npswpout 88\npgfault 1\n";
        let activity = ProcfsReader::parse_vmstat(content).unwrap();
        assert_eq!(activity.pages_in, 77);
        assert_eq!(activity.pages_out, 88);
    }

    #[test]
    fn test_parse_vmstat_requires_both_counters() {
        let err = ProcfsReader::parse_vmstat("pswpin 77\n").unwrap_err();
        assert!(matches!(
            err,
            CollectError::MissingField {
                field: "pswpout",
                ..
            }
        ));
    }
}
