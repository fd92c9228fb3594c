//! VNID range allocation for the OSDN overlay network.
//!
//! A VNID (virtual network identifier, mirroring the 24-bit VXLAN VNI
//! field) labels the isolated network segment a namespace belongs to.
//! This crate provides:
//!
//! - [`VnidRange`]: a validated closed interval of allocatable VNIDs
//! - [`AllocationStore`]: the injected bitmap seam, with
//!   [`ContiguousBitmap`] as the default lowest-free implementation
//! - [`VnidAllocator`]: the stateful allocator with snapshot/restore
//!   semantics, exposed to SDN plugin callers as [`VnidAllocation`]
//! - [`RangeAllocationRecord`]: the persisted snapshot form
//!
//! VNID 0 ([`GLOBAL_VNID`]) means "no isolation" and is never drawn from
//! an allocatable range.

mod allocator;
mod bitmap;
mod range;
mod record;

pub use allocator::{AllocatorError, AllocatorResult, VnidAllocation, VnidAllocator};
pub use bitmap::{contiguous_store, AllocationStore, ContiguousBitmap, StoreError, StoreFactory};
pub use range::{validate_vnid, RangeError, VnidRange, GLOBAL_VNID, MAX_VNID, MIN_VNID};
pub use record::RangeAllocationRecord;
