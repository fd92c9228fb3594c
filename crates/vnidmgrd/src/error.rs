//! Error types for vnidmgrd

use thiserror::Error;

use crate::registry::RegistryError;

/// VNID repair daemon errors
#[derive(Error, Debug)]
pub enum RepairError {
    /// Persisted allocation record could not be fetched within the retry
    /// budget
    #[error("unable to refresh the vnid allocation record after {attempts} attempts: {source}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        source: RegistryError,
    },

    /// Listing live NetNamespaces failed
    #[error("unable to refresh the vnid space: {0}")]
    ListNetNamespaces(#[source] RegistryError),

    /// The configured range has no free VNIDs left
    #[error("the vnid range is full; you must widen the range in order to create new netnamespaces")]
    RangeFull,

    /// Replaying a live assignment failed for an unexpected reason
    #[error("unable to allocate vnid {vnid} for netnamespace {netns}: {source}")]
    Replay {
        vnid: u32,
        netns: String,
        #[source]
        source: osdn_vnid::AllocatorError,
    },

    /// Persisting the rebuilt snapshot failed
    #[error("unable to persist the updated vnid allocations: {0}")]
    Persist(#[source] RegistryError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for vnidmgrd operations
pub type Result<T> = std::result::Result<T, RepairError>;
