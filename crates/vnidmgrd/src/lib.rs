//! vnidmgrd - VNID allocation repair daemon for the OSDN overlay network
//!
//! Periodically rebuilds the persisted VNID allocation record from the
//! authoritative NetNamespace list, healing drift between the bitmap and
//! the namespaces that actually exist.

mod config;
mod error;
mod registry;
mod repair;

pub use config::{
    VnidmgrdConfig, DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_DELAY_SECS,
    DEFAULT_REPAIR_INTERVAL_SECS,
};
pub use error::{RepairError, Result};
pub use registry::{
    MemoryNetNamespaceRegistry, MemoryRangeRegistry, NetNamespace, NetNamespaceRegistry,
    RangeRegistry, RegistryError,
};
pub use repair::{Repair, RepairAnomaly, RepairReport};
