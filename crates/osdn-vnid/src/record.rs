//! Persisted allocation snapshot record.

use serde::{Deserialize, Serialize};

/// The persisted form of an allocator's full state.
///
/// `range` is the exact string form of the range the snapshot was taken
/// under; a record may only be restored into an allocator whose range string
/// matches it exactly. `data` is the backing store's opaque bit blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeAllocationRecord {
    /// Range string, e.g. "200-299"
    pub range: String,
    /// Opaque serialized bitmap
    pub data: Vec<u8>,
}

impl RangeAllocationRecord {
    /// Creates an empty record for a range that has no snapshot yet.
    pub fn new(range: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            data: Vec::new(),
        }
    }
}
