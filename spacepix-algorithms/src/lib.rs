//! spacepix-algorithms: Clusterization pipelines for pixel detector cells.
//!
//! This crate provides:
//! - **Sparse CCL** - connected-component labeling of sorted, sparse cells
//! - **Sequential** - single-threaded reference pipeline
//! - **Parallel** - launch-based pipeline on rayon with atomic coordination
//! - Reductions from clusters to measurements and spacepoints
//!
#![warn(missing_docs)]

pub mod parallel;
mod processing;
pub mod reduction;
mod sequential;
pub mod sparse_ccl;
pub mod synthetic;
pub mod validation;

pub use parallel::ParallelClusterization;
pub use processing::{cluster_event, cluster_events, ExecutionModel};
pub use sequential::SequentialClusterization;
pub use sparse_ccl::{label_module, sparse_ccl};
pub use synthetic::{synthetic_event, SyntheticConfig};
pub use validation::{canonical_clusters, check_output, compare_outputs, Mismatch};

// Re-export core pipeline types
pub use spacepix_core::{Clusterization, ClusterizationConfig, EventOutput, EventStatistics};
