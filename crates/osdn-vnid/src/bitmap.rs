//! Bitmap-style allocation stores.
//!
//! The allocator does not own how bits are physically packed; it drives an
//! injected [`AllocationStore`]. [`ContiguousBitmap`] is the default
//! implementation: lowest-free-offset policy, interior locking so shared
//! references are safe across threads.

use std::sync::Mutex;

use thiserror::Error;

/// Errors an allocation store can raise.
///
/// The in-memory bitmap only raises `BlobTooLong`; remote stores may also
/// signal hard exhaustion on a specific allocate.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The store has no capacity left
    #[error("allocation store is full")]
    Full,

    /// Snapshot blob does not fit the store it is being restored into
    #[error("snapshot data length {got} exceeds store capacity {max} bytes")]
    BlobTooLong { got: usize, max: usize },
}

/// Backing store for a bounded range of allocatable offsets.
///
/// All methods take `&self`; implementations are responsible for their own
/// locking so that every operation appears atomic to concurrent callers.
pub trait AllocationStore: Send + Sync {
    /// Marks `offset` allocated. `Ok(false)` means it was already set or is
    /// out of bounds.
    fn allocate(&self, offset: usize) -> Result<bool, StoreError>;

    /// Allocates and returns an arbitrary free offset, `Ok(None)` when full.
    fn allocate_next(&self) -> Result<Option<usize>, StoreError>;

    /// Clears `offset` regardless of its prior state.
    fn release(&self, offset: usize);

    /// Returns true iff `offset` is currently allocated.
    fn has(&self, offset: usize) -> bool;

    /// Number of offsets still free.
    fn free(&self) -> usize;

    /// Serializes the full bit state into an opaque blob.
    fn snapshot(&self) -> Vec<u8>;

    /// Replaces all bit state from a blob produced by [`snapshot`].
    ///
    /// [`snapshot`]: AllocationStore::snapshot
    fn restore(&self, data: &[u8]) -> Result<(), StoreError>;
}

/// Factory producing a backing store for a range of `size` offsets.
///
/// `range_spec` is the string form of the range the store will serve; stores
/// may use it for labeling but must not interpret it.
pub type StoreFactory = fn(size: usize, range_spec: &str) -> Box<dyn AllocationStore>;

/// Default [`StoreFactory`] producing a [`ContiguousBitmap`].
pub fn contiguous_store(size: usize, _range_spec: &str) -> Box<dyn AllocationStore> {
    Box::new(ContiguousBitmap::new(size))
}

/// In-memory bitmap with a lowest-free-offset allocation policy.
pub struct ContiguousBitmap {
    size: usize,
    inner: Mutex<BitmapState>,
}

struct BitmapState {
    bits: Vec<u8>,
    allocated: usize,
}

impl ContiguousBitmap {
    /// Creates an all-free bitmap of `size` offsets.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            inner: Mutex::new(BitmapState {
                bits: vec![0u8; size.div_ceil(8)],
                allocated: 0,
            }),
        }
    }

    fn position(offset: usize) -> (usize, u8) {
        (offset / 8, 1u8 << (offset % 8))
    }
}

impl AllocationStore for ContiguousBitmap {
    fn allocate(&self, offset: usize) -> Result<bool, StoreError> {
        if offset >= self.size {
            return Ok(false);
        }
        let mut state = self.inner.lock().unwrap();
        let (byte, mask) = Self::position(offset);
        if state.bits[byte] & mask != 0 {
            return Ok(false);
        }
        state.bits[byte] |= mask;
        state.allocated += 1;
        Ok(true)
    }

    fn allocate_next(&self) -> Result<Option<usize>, StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.allocated >= self.size {
            return Ok(None);
        }
        for offset in 0..self.size {
            let (byte, mask) = Self::position(offset);
            if state.bits[byte] & mask == 0 {
                state.bits[byte] |= mask;
                state.allocated += 1;
                return Ok(Some(offset));
            }
        }
        Ok(None)
    }

    fn release(&self, offset: usize) {
        if offset >= self.size {
            return;
        }
        let mut state = self.inner.lock().unwrap();
        let (byte, mask) = Self::position(offset);
        if state.bits[byte] & mask != 0 {
            state.bits[byte] &= !mask;
            state.allocated -= 1;
        }
    }

    fn has(&self, offset: usize) -> bool {
        if offset >= self.size {
            return false;
        }
        let state = self.inner.lock().unwrap();
        let (byte, mask) = Self::position(offset);
        state.bits[byte] & mask != 0
    }

    fn free(&self) -> usize {
        let state = self.inner.lock().unwrap();
        self.size - state.allocated
    }

    fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().unwrap().bits.clone()
    }

    fn restore(&self, data: &[u8]) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        let capacity = state.bits.len();
        if data.len() > capacity {
            return Err(StoreError::BlobTooLong {
                got: data.len(),
                max: capacity,
            });
        }
        let mut bits = vec![0u8; capacity];
        bits[..data.len()].copy_from_slice(data);
        // Mask out padding bits past the last valid offset
        if self.size % 8 != 0 {
            if let Some(last) = bits.last_mut() {
                *last &= (1u8 << (self.size % 8)) - 1;
            }
        }
        state.allocated = bits.iter().map(|b| b.count_ones() as usize).sum();
        state.bits = bits;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_specific() {
        let bm = ContiguousBitmap::new(16);
        assert_eq!(bm.allocate(3), Ok(true));
        assert_eq!(bm.allocate(3), Ok(false));
        assert!(bm.has(3));
        assert_eq!(bm.free(), 15);
    }

    #[test]
    fn test_allocate_out_of_bounds() {
        let bm = ContiguousBitmap::new(16);
        assert_eq!(bm.allocate(16), Ok(false));
        assert!(!bm.has(16));
    }

    #[test]
    fn test_allocate_next_lowest_free() {
        let bm = ContiguousBitmap::new(8);
        assert_eq!(bm.allocate_next(), Ok(Some(0)));
        assert_eq!(bm.allocate_next(), Ok(Some(1)));
        bm.release(0);
        assert_eq!(bm.allocate_next(), Ok(Some(0)));
    }

    #[test]
    fn test_exhaustion() {
        let bm = ContiguousBitmap::new(4);
        for _ in 0..4 {
            assert!(bm.allocate_next().unwrap().is_some());
        }
        assert_eq!(bm.allocate_next(), Ok(None));
        assert_eq!(bm.free(), 0);
    }

    #[test]
    fn test_release_idempotent() {
        let bm = ContiguousBitmap::new(8);
        assert_eq!(bm.allocate(2), Ok(true));
        bm.release(2);
        bm.release(2);
        bm.release(100); // out of bounds, no-op
        assert_eq!(bm.free(), 8);
    }

    #[test]
    fn test_snapshot_restore() {
        let bm = ContiguousBitmap::new(100);
        for offset in [0, 7, 8, 63, 99] {
            assert_eq!(bm.allocate(offset), Ok(true));
        }
        let blob = bm.snapshot();

        let restored = ContiguousBitmap::new(100);
        restored.restore(&blob).unwrap();
        for offset in 0..100 {
            assert_eq!(restored.has(offset), bm.has(offset), "offset {}", offset);
        }
        assert_eq!(restored.free(), bm.free());
    }

    #[test]
    fn test_restore_rejects_oversized_blob() {
        let bm = ContiguousBitmap::new(8);
        let err = bm.restore(&[0xff, 0xff]).unwrap_err();
        assert_eq!(err, StoreError::BlobTooLong { got: 2, max: 1 });
    }

    #[test]
    fn test_restore_masks_padding_bits() {
        // 4-offset store lives in one byte; high nibble is padding
        let bm = ContiguousBitmap::new(4);
        bm.restore(&[0xff]).unwrap();
        assert_eq!(bm.free(), 0);
        assert!(!bm.has(4));
        bm.release(0);
        assert_eq!(bm.free(), 1);
    }

    #[test]
    fn test_concurrent_allocate_next_unique() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let bm = Arc::new(ContiguousBitmap::new(64));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let bm = Arc::clone(&bm);
            handles.push(std::thread::spawn(move || {
                let mut got = Vec::new();
                for _ in 0..16 {
                    if let Ok(Some(offset)) = bm.allocate_next() {
                        got.push(offset);
                    }
                }
                got
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        assert_eq!(all.len(), 64);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 64);
        assert_eq!(bm.free(), 0);
    }
}
