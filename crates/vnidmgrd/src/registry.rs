//! Registry abstractions consumed by the repair controller.
//!
//! The controller reads two authoritative stores: the NetNamespace list
//! (which namespace currently claims which VNID) and the range-allocation
//! record store (the persisted bitmap snapshot). Both are behind async
//! traits; the in-memory implementations back the daemon's standalone mode
//! and the test suite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use osdn_vnid::RangeAllocationRecord;

/// Registry-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Backing store is not reachable (possibly still starting up)
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Requested object does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Write was rejected by the backing store
    #[error("write rejected: {0}")]
    WriteRejected(String),
}

/// A namespace's current VNID assignment.
///
/// `net_id` of 0 is the global VNID (no isolation); `None` means the
/// namespace has not been assigned yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetNamespace {
    /// Namespace name
    pub net_name: String,
    /// Assigned VNID, if any
    pub net_id: Option<u32>,
}

impl NetNamespace {
    /// Creates a NetNamespace with an assigned VNID.
    pub fn new(net_name: impl Into<String>, net_id: u32) -> Self {
        Self {
            net_name: net_name.into(),
            net_id: Some(net_id),
        }
    }
}

/// Read access to the live NetNamespace list.
#[async_trait]
pub trait NetNamespaceRegistry: Send + Sync {
    /// Lists every NetNamespace currently in the cluster.
    async fn list_net_namespaces(&self) -> Result<Vec<NetNamespace>, RegistryError>;
}

/// Storage for the persisted range-allocation record.
#[async_trait]
pub trait RangeRegistry: Send + Sync {
    /// Fetches the current record.
    async fn get(&self) -> Result<RangeAllocationRecord, RegistryError>;

    /// Creates the record, or replaces it wholesale if it already exists.
    async fn create_or_update(&self, record: &RangeAllocationRecord) -> Result<(), RegistryError>;
}

/// In-memory NetNamespace registry.
#[derive(Default)]
pub struct MemoryNetNamespaceRegistry {
    namespaces: Mutex<HashMap<String, NetNamespace>>,
}

impl MemoryNetNamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a namespace entry.
    pub fn upsert(&self, netns: NetNamespace) {
        self.namespaces
            .lock()
            .unwrap()
            .insert(netns.net_name.clone(), netns);
    }

    /// Removes a namespace entry.
    pub fn remove(&self, net_name: &str) {
        self.namespaces.lock().unwrap().remove(net_name);
    }
}

#[async_trait]
impl NetNamespaceRegistry for MemoryNetNamespaceRegistry {
    async fn list_net_namespaces(&self) -> Result<Vec<NetNamespace>, RegistryError> {
        let mut list: Vec<_> = self.namespaces.lock().unwrap().values().cloned().collect();
        list.sort_by(|a, b| a.net_name.cmp(&b.net_name));
        Ok(list)
    }
}

/// In-memory range-allocation record store.
///
/// `fail_gets_remaining` simulates a backing store that is still starting
/// up: that many `get` calls fail with [`RegistryError::Unavailable`]
/// before the store comes online.
#[derive(Default)]
pub struct MemoryRangeRegistry {
    record: Mutex<Option<RangeAllocationRecord>>,
    fail_gets_remaining: Mutex<u32>,
}

impl MemoryRangeRegistry {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with an existing record.
    pub fn with_record(record: RangeAllocationRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            fail_gets_remaining: Mutex::new(0),
        }
    }

    /// Makes the next `count` calls to `get` fail as unavailable.
    pub fn fail_next_gets(&self, count: u32) {
        *self.fail_gets_remaining.lock().unwrap() = count;
    }

    /// Returns the currently stored record, if any.
    pub fn stored(&self) -> Option<RangeAllocationRecord> {
        self.record.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeRegistry for MemoryRangeRegistry {
    async fn get(&self) -> Result<RangeAllocationRecord, RegistryError> {
        {
            let mut remaining = self.fail_gets_remaining.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RegistryError::Unavailable(
                    "range registry still starting".to_string(),
                ));
            }
        }
        self.record
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| RegistryError::NotFound("vnid range allocation record".to_string()))
    }

    async fn create_or_update(&self, record: &RangeAllocationRecord) -> Result<(), RegistryError> {
        *self.record.lock().unwrap() = Some(record.clone());
        Ok(())
    }
}
