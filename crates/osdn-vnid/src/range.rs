//! VNID range value type.
//!
//! A VNID (virtual network identifier) mirrors the 24-bit VXLAN VNI field.
//! Value 0 is the global VNID ("no isolation", reachable from every other
//! network) and is never drawn from an allocatable range; values 1-9 are
//! reserved for future special cases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The global VNID, meaning "no isolation".
pub const GLOBAL_VNID: u32 = 0;

/// Lowest allocatable VNID. Values 1-9 are reserved.
pub const MIN_VNID: u32 = 10;

/// Highest allocatable VNID (24-bit VXLAN VNI limit).
pub const MAX_VNID: u32 = (1 << 24) - 1;

/// Errors from range construction and parsing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RangeError {
    /// Range base is below the reserved floor
    #[error("invalid vnid range base {0}: must be at least {MIN_VNID}")]
    BaseTooLow(u32),

    /// Range has no values in it
    #[error("invalid vnid range: size must be greater than zero")]
    EmptySize,

    /// Range extends past the 24-bit VNI limit
    #[error("invalid vnid range end {0}: must be at most {MAX_VNID}")]
    EndTooHigh(u64),

    /// Range string is not "<low>-<high>"
    #[error("invalid vnid range format {0:?}: expected \"<low>-<high>\"")]
    Format(String),

    /// Standalone VNID is below the reserved floor and not the global VNID
    #[error("invalid vnid {0}: must be {GLOBAL_VNID} or at least {MIN_VNID}")]
    VnidTooLow(u32),

    /// Standalone VNID is past the 24-bit VNI limit
    #[error("invalid vnid {0}: must be at most {MAX_VNID}")]
    VnidTooHigh(u32),
}

/// A closed interval of allocatable VNIDs.
///
/// Immutable after construction; `Display` and `FromStr` round-trip so the
/// range can key a persisted allocation snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VnidRange {
    base: u32,
    size: u32,
}

impl VnidRange {
    /// Creates a validated range of `size` VNIDs starting at `base`.
    pub fn new(base: u32, size: u32) -> Result<Self, RangeError> {
        if base < MIN_VNID {
            return Err(RangeError::BaseTooLow(base));
        }
        if size == 0 {
            return Err(RangeError::EmptySize);
        }
        let end = base as u64 + size as u64 - 1;
        if end > MAX_VNID as u64 {
            return Err(RangeError::EndTooHigh(end));
        }
        Ok(Self { base, size })
    }

    /// First VNID in the range.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of VNIDs in the range.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Last VNID in the range.
    pub fn end(&self) -> u32 {
        self.base + self.size - 1
    }

    /// Returns true iff `vnid` falls inside this range.
    pub fn contains(&self, vnid: u32) -> bool {
        vnid >= self.base && vnid - self.base < self.size
    }

    /// Maps a VNID to its bit offset, if in range.
    pub fn offset_of(&self, vnid: u32) -> Option<usize> {
        if self.contains(vnid) {
            Some((vnid - self.base) as usize)
        } else {
            None
        }
    }

    /// Maps a bit offset back to its VNID.
    pub fn vnid_at(&self, offset: usize) -> u32 {
        self.base + offset as u32
    }
}

impl fmt::Display for VnidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 0 {
            return Ok(());
        }
        write!(f, "{}-{}", self.base, self.end())
    }
}

impl FromStr for VnidRange {
    type Err = RangeError;

    /// Parses `"<low>-<high>"` (inclusive bounds, single hyphen).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once('-')
            .ok_or_else(|| RangeError::Format(s.to_string()))?;
        let low: u32 = low
            .parse()
            .map_err(|_| RangeError::Format(s.to_string()))?;
        let high: u32 = high
            .parse()
            .map_err(|_| RangeError::Format(s.to_string()))?;
        if high < low {
            return Err(RangeError::Format(s.to_string()));
        }
        // Widen before the +1: "0-4294967295" would overflow u32. A span
        // that wide can never pass range validation, so reject it as the
        // constructor would reject its base.
        let size = high as u64 - low as u64 + 1;
        let Ok(size) = u32::try_from(size) else {
            return Err(RangeError::BaseTooLow(low));
        };
        Self::new(low, size)
    }
}

/// Validates a single VNID value independent of any configured range.
///
/// `GLOBAL_VNID` is always valid; everything else must land in
/// `[MIN_VNID, MAX_VNID]`.
pub fn validate_vnid(vnid: u32) -> Result<(), RangeError> {
    if vnid == GLOBAL_VNID {
        return Ok(());
    }
    if vnid < MIN_VNID {
        return Err(RangeError::VnidTooLow(vnid));
    }
    if vnid > MAX_VNID {
        return Err(RangeError::VnidTooHigh(vnid));
    }
    Ok(())
}
