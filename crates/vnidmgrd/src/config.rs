//! Daemon configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use osdn_vnid::{RangeError, VnidRange};

/// Default seconds between repair cycles.
pub const DEFAULT_REPAIR_INTERVAL_SECS: u64 = 60;

/// Default attempts to fetch the persisted record before giving up.
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 10;

/// Default delay between fetch attempts (seconds).
pub const DEFAULT_FETCH_DELAY_SECS: u64 = 1;

/// vnidmgrd configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnidmgrdConfig {
    /// First allocatable VNID
    pub range_base: u32,
    /// Number of allocatable VNIDs
    pub range_size: u32,
    /// Seconds between repair cycles
    #[serde(default = "default_repair_interval")]
    pub repair_interval_secs: u64,
    /// Attempts to fetch the persisted record at the start of a cycle
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    /// Seconds to sleep between fetch attempts
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_secs: u64,
}

fn default_repair_interval() -> u64 {
    DEFAULT_REPAIR_INTERVAL_SECS
}

fn default_fetch_attempts() -> u32 {
    DEFAULT_FETCH_ATTEMPTS
}

fn default_fetch_delay() -> u64 {
    DEFAULT_FETCH_DELAY_SECS
}

impl VnidmgrdConfig {
    /// Creates a config with default timing for the given range.
    pub fn new(range_base: u32, range_size: u32) -> Self {
        Self {
            range_base,
            range_size,
            repair_interval_secs: DEFAULT_REPAIR_INTERVAL_SECS,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            fetch_delay_secs: DEFAULT_FETCH_DELAY_SECS,
        }
    }

    /// Validates and returns the configured VNID range.
    pub fn range(&self) -> Result<VnidRange, RangeError> {
        VnidRange::new(self.range_base, self.range_size)
    }

    /// Interval between repair cycles.
    pub fn repair_interval(&self) -> Duration {
        Duration::from_secs(self.repair_interval_secs)
    }

    /// Delay between record fetch attempts.
    pub fn fetch_delay(&self) -> Duration {
        Duration::from_secs(self.fetch_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_defaults() {
        let cfg = VnidmgrdConfig::new(200, 100);
        assert_eq!(cfg.repair_interval_secs, 60);
        assert_eq!(cfg.fetch_attempts, 10);
        assert_eq!(cfg.fetch_delay_secs, 1);
    }

    #[test]
    fn test_range_validation() {
        assert!(VnidmgrdConfig::new(200, 100).range().is_ok());
        assert!(VnidmgrdConfig::new(5, 100).range().is_err());
        assert!(VnidmgrdConfig::new(200, 0).range().is_err());
    }

    #[test]
    fn test_serde_defaults_fill_in() {
        let cfg: VnidmgrdConfig =
            serde_json::from_str(r#"{"range_base": 200, "range_size": 100}"#).unwrap();
        assert_eq!(cfg.range_base, 200);
        assert_eq!(cfg.fetch_attempts, DEFAULT_FETCH_ATTEMPTS);
        assert_eq!(cfg.repair_interval_secs, DEFAULT_REPAIR_INTERVAL_SECS);
    }
}
