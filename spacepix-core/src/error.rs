//! Error types for spacepix-core.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias for spacepix operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Core error types for spacepix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A geometry id has no entry in the detector or digitization tables.
    #[error("unknown module: geometry id {geometry_id:#x} has no {table} entry")]
    UnknownModule {
        geometry_id: u64,
        table: &'static str,
    },

    /// A placement whose rotation part is not orthonormal.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Clusterization pipeline failure.
    #[error("clusterization error: {0}")]
    Clusterization(#[from] ClusterizationError),
}

/// Failures of a single pipeline run.
///
/// Every variant is fatal for the event being processed: no stage
/// returns partial results. Apart from `Allocation` and `ThreadPool`,
/// the variants are invariant violations that correct sizing makes
/// unreachable.
#[derive(Error, Debug)]
pub enum ClusterizationError {
    /// Reserving a stage buffer failed.
    #[error("failed to allocate {what}: {source}")]
    Allocation {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// A label outside `1..=n_clusters` was produced for a module.
    #[error("label {label} out of range for module {module} with {n_clusters} clusters")]
    LabelOutOfRange {
        module: usize,
        label: u32,
        n_clusters: usize,
    },

    /// A global cluster index outside `[0, N)`.
    #[error("cluster index {index} out of range (total clusters {total})")]
    ClusterIndexOutOfRange { index: usize, total: usize },

    /// More cells routed to a cluster than its sized capacity.
    #[error("cluster {cluster} overflowed its capacity of {capacity} cells")]
    SlotOverflow { cluster: usize, capacity: usize },

    /// A cluster slot position was written twice.
    #[error("cluster {cluster} slot {position} written twice")]
    SlotConflict { cluster: usize, position: usize },

    /// A cluster slot was left empty after the scatter stage.
    #[error("cluster {cluster} received {written} of {capacity} cells")]
    SlotUnderflow {
        cluster: usize,
        written: usize,
        capacity: usize,
    },

    /// Stage inputs disagree on their dimensions.
    #[error("layout mismatch: {0}")]
    LayoutMismatch(String),

    /// The dedicated worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl ClusterizationError {
    /// Wraps a failed reservation for the named buffer.
    pub fn allocation(what: &'static str) -> impl FnOnce(TryReserveError) -> Self {
        move |source| Self::Allocation { what, source }
    }
}
