//! VNID allocator over a bounded range.

use thiserror::Error;

use crate::bitmap::{contiguous_store, AllocationStore, StoreFactory};
use crate::range::VnidRange;
use crate::record::RangeAllocationRecord;

/// Allocation errors. Each variant is a sentinel callers branch on with
/// `matches!`, never by inspecting the message.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AllocatorError {
    /// Every VNID in the range is allocated
    #[error("vnid range is full")]
    Full,

    /// Requested VNID falls outside the configured range
    #[error("vnid is not in the allocatable range")]
    NotInRange,

    /// Requested VNID is already allocated
    #[error("vnid is already allocated")]
    Allocated,

    /// Snapshot was taken under a different range
    #[error("snapshot range {snapshot:?} does not match allocator range {allocator:?}")]
    MismatchedRange {
        snapshot: String,
        allocator: String,
    },

    /// Backing store failed in a way the allocator does not interpret
    #[error("allocation store error: {0}")]
    Store(#[source] crate::bitmap::StoreError),
}

impl From<crate::bitmap::StoreError> for AllocatorError {
    fn from(e: crate::bitmap::StoreError) -> Self {
        match e {
            crate::bitmap::StoreError::Full => AllocatorError::Full,
            other => AllocatorError::Store(other),
        }
    }
}

/// Result alias for allocator operations.
pub type AllocatorResult<T> = Result<T, AllocatorError>;

/// The allocation surface consumed by SDN plugin code assigning VNIDs to
/// namespaces. Object-safe so callers can share `Arc<dyn VnidAllocation>`.
pub trait VnidAllocation: Send + Sync {
    /// Allocates a specific VNID.
    fn allocate(&self, vnid: u32) -> AllocatorResult<()>;

    /// Allocates and returns a currently-free VNID.
    fn allocate_next(&self) -> AllocatorResult<u32>;

    /// Releases a VNID. Out-of-range values are a silent no-op.
    fn release(&self, vnid: u32) -> AllocatorResult<()>;

    /// Returns true iff the VNID is currently allocated.
    fn has(&self, vnid: u32) -> bool;
}

/// Stateful VNID allocator mapping a [`VnidRange`] onto an injected
/// [`AllocationStore`].
pub struct VnidAllocator {
    range: VnidRange,
    store: Box<dyn AllocationStore>,
}

impl VnidAllocator {
    /// Creates an allocator whose backing store comes from `factory`.
    pub fn new(range: VnidRange, factory: StoreFactory) -> Self {
        let spec = range.to_string();
        let store = factory(range.size() as usize, &spec);
        Self { range, store }
    }

    /// Creates an allocator over the default in-memory contiguous bitmap.
    pub fn with_contiguous_store(range: VnidRange) -> Self {
        Self::new(range, contiguous_store)
    }

    /// The configured range.
    pub fn range(&self) -> &VnidRange {
        &self.range
    }

    /// Count of VNIDs still free.
    pub fn free(&self) -> usize {
        self.store.free()
    }

    /// Writes the range string and the store's serialized bit state into
    /// `dst`.
    pub fn snapshot(&self, dst: &mut RangeAllocationRecord) {
        dst.range = self.range.to_string();
        dst.data = self.store.snapshot();
    }

    /// Replaces all allocation state from a snapshot taken under `range`.
    ///
    /// The guard is exact string equality, not semantic equivalence: a
    /// snapshot from any other range, overlapping or not, is rejected with
    /// [`AllocatorError::MismatchedRange`].
    pub fn restore(&self, range: &VnidRange, data: &[u8]) -> AllocatorResult<()> {
        let snapshot_spec = range.to_string();
        let allocator_spec = self.range.to_string();
        if snapshot_spec != allocator_spec {
            return Err(AllocatorError::MismatchedRange {
                snapshot: snapshot_spec,
                allocator: allocator_spec,
            });
        }
        self.store.restore(data)?;
        Ok(())
    }
}

impl VnidAllocation for VnidAllocator {
    fn allocate(&self, vnid: u32) -> AllocatorResult<()> {
        let offset = self.range.offset_of(vnid).ok_or(AllocatorError::NotInRange)?;
        if !self.store.allocate(offset)? {
            return Err(AllocatorError::Allocated);
        }
        Ok(())
    }

    fn allocate_next(&self) -> AllocatorResult<u32> {
        let offset = self.store.allocate_next()?.ok_or(AllocatorError::Full)?;
        Ok(self.range.vnid_at(offset))
    }

    fn release(&self, vnid: u32) -> AllocatorResult<()> {
        // Releasing something never allocated or out of bounds is harmless.
        if let Some(offset) = self.range.offset_of(vnid) {
            self.store.release(offset);
        }
        Ok(())
    }

    fn has(&self, vnid: u32) -> bool {
        match self.range.offset_of(vnid) {
            Some(offset) => self.store.has(offset),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn allocator(base: u32, size: u32) -> VnidAllocator {
        VnidAllocator::with_contiguous_store(VnidRange::new(base, size).unwrap())
    }

    #[test]
    fn test_allocate_specific() {
        let a = allocator(200, 100);
        a.allocate(250).unwrap();
        assert!(a.has(250));
        assert_eq!(a.allocate(250), Err(AllocatorError::Allocated));
    }

    #[test]
    fn test_allocate_out_of_range() {
        let a = allocator(200, 100);
        assert_eq!(a.allocate(199), Err(AllocatorError::NotInRange));
        assert_eq!(a.allocate(300), Err(AllocatorError::NotInRange));
        assert_eq!(a.allocate(0), Err(AllocatorError::NotInRange));
    }

    #[test]
    fn test_allocate_next_never_repeats() {
        let a = allocator(200, 100);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let vnid = a.allocate_next().unwrap();
            assert!(a.range().contains(vnid));
            assert!(seen.insert(vnid), "vnid {} repeated", vnid);
        }
        assert_eq!(a.free(), 0);
        assert_eq!(a.allocate_next(), Err(AllocatorError::Full));
    }

    #[test]
    fn test_release_then_reallocate() {
        let a = allocator(200, 100);
        a.allocate(210).unwrap();
        a.release(210).unwrap();
        a.allocate(210).unwrap();
        assert!(a.has(210));
    }

    #[test]
    fn test_release_out_of_range_is_noop() {
        let a = allocator(200, 100);
        assert!(a.release(5000).is_ok());
        assert!(a.release(0).is_ok());
        // never-allocated but in range is also fine
        assert!(a.release(250).is_ok());
        assert_eq!(a.free(), 100);
    }

    #[test]
    fn test_full_range_then_release_gives_lowest() {
        let a = allocator(200, 100);
        for _ in 0..100 {
            a.allocate_next().unwrap();
        }
        assert_eq!(a.allocate_next(), Err(AllocatorError::Full));

        a.release(210).unwrap();
        assert_eq!(a.free(), 1);
        // contiguous store hands back the lowest free offset
        assert_eq!(a.allocate_next().unwrap(), 210);
    }

    #[test]
    fn test_has_out_of_range() {
        let a = allocator(200, 100);
        assert!(!a.has(199));
        assert!(!a.has(300));
    }

    #[test]
    fn test_snapshot_restore_same_range() {
        let a = allocator(200, 100);
        for vnid in [200, 207, 208, 263, 299] {
            a.allocate(vnid).unwrap();
        }
        let mut record = RangeAllocationRecord::default();
        a.snapshot(&mut record);
        assert_eq!(record.range, "200-299");

        let range: VnidRange = record.range.parse().unwrap();
        let b = allocator(200, 100);
        b.restore(&range, &record.data).unwrap();
        for vnid in 200..=299 {
            assert_eq!(b.has(vnid), a.has(vnid), "vnid {}", vnid);
        }
        assert_eq!(b.free(), a.free());
    }

    #[test]
    fn test_restore_mismatched_range() {
        let a = allocator(200, 100);
        let mut record = RangeAllocationRecord::default();
        a.snapshot(&mut record);

        // overlapping but not identical
        let b = allocator(200, 50);
        let range: VnidRange = record.range.parse().unwrap();
        let err = b.restore(&range, &record.data).unwrap_err();
        assert!(matches!(err, AllocatorError::MismatchedRange { .. }));
    }

    #[test]
    fn test_trait_object() {
        let a: std::sync::Arc<dyn VnidAllocation> =
            std::sync::Arc::new(allocator(200, 100));
        a.allocate(222).unwrap();
        assert!(a.has(222));
    }
}
