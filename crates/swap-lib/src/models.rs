//! Core data models for swap collection

use serde::{Deserialize, Serialize};

/// Auxiliary swap category reported next to used/free
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auxiliary {
    /// State label value, e.g. `cached` or `reserved`
    pub name: String,
    pub bytes: u64,
}

/// One swap area, or the whole system when the backend cannot enumerate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReading {
    /// Device path, only set in per-device mode
    pub device: Option<String>,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub auxiliary: Option<Auxiliary>,
}

impl SwapReading {
    /// Reading without an auxiliary category
    pub fn new(device: Option<String>, used_bytes: u64, free_bytes: u64) -> Self {
        Self {
            device,
            used_bytes,
            free_bytes,
            auxiliary: None,
        }
    }

    /// Build a reading from a raw total and used value, scaled by `unit`.
    ///
    /// Returns `None` when the raw values violate `0 <= used <= total`
    /// or the scaled total does not fit in a u64.
    pub fn from_total_used(
        device: Option<String>,
        total: i64,
        used: i64,
        unit: u64,
    ) -> Option<Self> {
        if total < used || used < 0 {
            return None;
        }
        let total = (total as u64).checked_mul(unit)?;
        let used = (used as u64).checked_mul(unit)?;
        Some(Self::new(device, used, total - used))
    }

    /// Attach an auxiliary category
    pub fn with_auxiliary(mut self, name: impl Into<String>, bytes: u64) -> Self {
        self.auxiliary = Some(Auxiliary {
            name: name.into(),
            bytes,
        });
        self
    }

    /// Total swap space covered by this reading
    pub fn total_bytes(&self) -> u64 {
        self.used_bytes
            .saturating_add(self.free_bytes)
            .saturating_add(self.auxiliary.as_ref().map(|a| a.bytes).unwrap_or(0))
    }
}

/// Pages moved between memory and swap since boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingActivity {
    pub pages_in: u64,
    pub pages_out: u64,
}

/// Everything a reader produced in one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    pub readings: Vec<SwapReading>,
    pub paging: Option<PagingActivity>,
    /// Entries dropped because they failed to parse or were inconsistent
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_total_used_scales_by_unit() {
        let reading = SwapReading::from_total_used(Some("/dev/sda2".into()), 2097152, 512000, 1024)
            .unwrap();
        assert_eq!(reading.used_bytes, 524288000);
        assert_eq!(reading.free_bytes, 1623195648);
        assert_eq!(reading.total_bytes(), 2097152 * 1024);
    }

    #[test]
    fn test_from_total_used_rejects_inconsistent() {
        assert!(SwapReading::from_total_used(None, 100, 101, 1).is_none());
        assert!(SwapReading::from_total_used(None, 100, -1, 1).is_none());
        assert!(SwapReading::from_total_used(None, -5, -10, 1).is_none());
    }

    #[test]
    fn test_from_total_used_rejects_unrepresentable_bytes() {
        assert!(SwapReading::from_total_used(None, i64::MAX, 1, 1024).is_none());
        assert!(SwapReading::from_total_used(None, i64::MAX, 0, 4).is_none());

        let reading = SwapReading::from_total_used(None, i64::MAX, 1, 2).unwrap();
        assert_eq!(reading.used_bytes, 2);
        assert_eq!(reading.total_bytes(), i64::MAX as u64 * 2);
    }

    #[test]
    fn test_total_includes_auxiliary() {
        let reading = SwapReading::new(None, 30, 60).with_auxiliary("cached", 10);
        assert_eq!(reading.total_bytes(), 100);
    }

    #[test]
    fn test_total_saturates() {
        let reading = SwapReading::new(None, u64::MAX, 1).with_auxiliary("cached", 1);
        assert_eq!(reading.total_bytes(), u64::MAX);
    }
}
