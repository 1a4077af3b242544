//! Clusterization traits and types.

use crate::cluster::{ClusterContainer, ClusterLayout, ModuleLabels};
use crate::error::{ClusterizationError, Error, Result};
use crate::event::CellContainer;
use crate::measurement::{MeasurementContainer, SpacepointContainer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration shared by all clusterization implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterizationConfig {
    /// Tasks per block in parallel launches; grids are rounded up to it.
    pub block_size: usize,
    /// Worker threads for a dedicated pool (`None` = global rayon pool).
    pub num_threads: Option<usize>,
}

impl Default for ClusterizationConfig {
    fn default() -> Self {
        Self {
            block_size: 64,
            num_threads: None,
        }
    }
}

impl ClusterizationConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the launch block size.
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the number of worker threads.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for a zero block size or thread count.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::ConfigError("block_size must be at least 1".into()));
        }
        if self.num_threads == Some(0) {
            return Err(Error::ConfigError("num_threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// Every stage product of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct EventOutput {
    /// Per-module labels (stage 1).
    pub labels: Vec<ModuleLabels>,
    /// Global cluster-id layout (stage 2).
    pub layout: ClusterLayout,
    /// Cell count per global cluster (stage 3).
    pub cluster_sizes: Vec<usize>,
    /// Clusters indexed by global cluster id (stages 4 and 5).
    pub clusters: ClusterContainer,
    /// Measurements per module (stage 6).
    pub measurements: MeasurementContainer,
    /// Spacepoints per module (stage 7).
    pub spacepoints: SpacepointContainer,
}

impl EventOutput {
    /// Counts summarising the run.
    #[must_use]
    pub fn statistics(&self) -> EventStatistics {
        EventStatistics {
            modules: self.layout.module_count(),
            cells: self.cluster_sizes.iter().sum(),
            clusters: self.clusters.len(),
            measurements: self.measurements.total_size(),
            spacepoints: self.spacepoints.total_size(),
        }
    }
}

/// Statistics for one or more processed events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventStatistics {
    /// Modules read.
    pub modules: usize,
    /// Cells read.
    pub cells: usize,
    /// Clusters found.
    pub clusters: usize,
    /// Measurements created.
    pub measurements: usize,
    /// Spacepoints created.
    pub spacepoints: usize,
}

impl std::ops::AddAssign for EventStatistics {
    fn add_assign(&mut self, other: Self) {
        self.modules += other.modules;
        self.cells += other.cells;
        self.clusters += other.clusters;
        self.measurements += other.measurements;
        self.spacepoints += other.spacepoints;
    }
}

/// Trait for clusterization pipelines.
///
/// Each method is one stage. Implementations differ only in how a stage is
/// executed; the stage contracts below are shared, so every implementation
/// is validated against the same property suite.
pub trait Clusterization: Send + Sync {
    /// Implementation name.
    fn name(&self) -> &'static str;

    /// Current configuration.
    fn config(&self) -> &ClusterizationConfig;

    /// Stage 1: connected-component labels for every module.
    ///
    /// # Errors
    /// Fails only on allocation failure.
    fn label(&self, cells: &CellContainer) -> Result<Vec<ModuleLabels>, ClusterizationError>;

    /// Stage 2: disjoint global offsets for every module's clusters.
    ///
    /// # Errors
    /// Fails if the resulting ranges do not partition `[0, N)`.
    fn count(&self, labels: &[ModuleLabels]) -> Result<ClusterLayout, ClusterizationError>;

    /// Stage 3: exact cell count per global cluster.
    ///
    /// # Errors
    /// Fails on a label that maps outside its module's range.
    fn size(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
    ) -> Result<Vec<usize>, ClusterizationError>;

    /// Stages 4 and 5: allocate exactly sized cluster slots and scatter every
    /// cell into its cluster.
    ///
    /// # Errors
    /// Fails on allocation failure or any slot over/underflow.
    fn connect(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
        cluster_sizes: &[usize],
    ) -> Result<ClusterContainer, ClusterizationError>;

    /// Stage 6: one measurement per cluster, grouped per module in label order.
    ///
    /// # Errors
    /// Fails if `clusters` does not match `layout`.
    fn create_measurements(
        &self,
        cells: &CellContainer,
        clusters: &ClusterContainer,
        layout: &ClusterLayout,
    ) -> Result<MeasurementContainer, ClusterizationError>;

    /// Stage 7: one spacepoint per measurement.
    ///
    /// # Errors
    /// Fails only on allocation failure.
    fn form_spacepoints(
        &self,
        measurements: &MeasurementContainer,
    ) -> Result<SpacepointContainer, ClusterizationError>;

    /// Runs all stages on one event.
    ///
    /// # Errors
    /// Propagates the first stage failure; no partial output is returned.
    fn run(&self, cells: &CellContainer) -> Result<EventOutput, ClusterizationError> {
        let labels = self.label(cells)?;
        let layout = self.count(&labels)?;
        log::debug!(
            "{}: {} modules, {} cells, {} clusters",
            self.name(),
            cells.len(),
            cells.total_size(),
            layout.total()
        );

        let cluster_sizes = self.size(cells, &labels, &layout)?;
        let clusters = self.connect(cells, &labels, &layout, &cluster_sizes)?;
        let measurements = self.create_measurements(cells, &clusters, &layout)?;
        let spacepoints = self.form_spacepoints(&measurements)?;
        log::debug!(
            "{}: {} measurements, {} spacepoints",
            self.name(),
            measurements.total_size(),
            spacepoints.total_size()
        );

        Ok(EventOutput {
            labels,
            layout,
            cluster_sizes,
            clusters,
            measurements,
            spacepoints,
        })
    }
}
