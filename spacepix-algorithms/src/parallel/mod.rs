//! Data-parallel clusterization.
//!
//! Every stage is a separate launch over a padded task grid; the return of
//! one launch is the barrier before the next. Shared counters only grow by
//! atomic fetch-and-add, so module offsets and the cell order inside a
//! cluster depend on scheduling. Cluster contents, cluster sizes and
//! measurements per module do not.

pub mod launch;
pub mod state;

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use spacepix_core::{
    CellContainer, ClusterContainer, ClusterLayout, Clusterization, ClusterizationConfig,
    ClusterizationError, FlatIndex, MeasurementContainer, ModuleLabels, Result,
    SpacepointContainer,
};

use crate::reduction::{module_measurements, module_spacepoints};
use crate::sequential::check_module_count;
use crate::sparse_ccl::sparse_ccl;

use self::launch::launch;
use self::state::{CountingState, ScatterState, SizingState};

/// Parallel implementation of every pipeline stage.
///
/// Runs on the global rayon pool unless the configuration asks for a fixed
/// thread count, in which case a dedicated pool is built once and reused.
#[derive(Debug, Clone, Default)]
pub struct ParallelClusterization {
    config: ClusterizationConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelClusterization {
    /// Create with default configuration on the global pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the thread pool
    /// cannot be built.
    pub fn with_config(config: ClusterizationConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.num_threads {
            Some(threads) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("spacepix-{i}"))
                    .build()
                    .map_err(|e| ClusterizationError::ThreadPool(e.to_string()))?;
                log::debug!("Built dedicated pool with {threads} threads");
                Some(Arc::new(pool))
            }
            None => None,
        };
        Ok(Self { config, pool })
    }

    /// Worker count used by launches.
    #[must_use]
    pub fn current_num_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or_else(rayon::current_num_threads, |pool| pool.current_num_threads())
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn block_size(&self) -> usize {
        self.config.block_size
    }
}

impl Clusterization for ParallelClusterization {
    fn name(&self) -> &'static str {
        "Parallel"
    }

    fn config(&self) -> &ClusterizationConfig {
        &self.config
    }

    fn label(
        &self,
        cells: &CellContainer,
    ) -> std::result::Result<Vec<ModuleLabels>, ClusterizationError> {
        self.install(|| {
            cells
                .items()
                .par_iter()
                .map(|module_cells| {
                    let mut labels = Vec::new();
                    labels
                        .try_reserve_exact(module_cells.len())
                        .map_err(ClusterizationError::allocation("cell labels"))?;
                    labels.resize(module_cells.len(), 0);
                    let n_clusters = sparse_ccl(module_cells, &mut labels);
                    Ok(ModuleLabels { n_clusters, labels })
                })
                .collect()
        })
    }

    fn count(
        &self,
        labels: &[ModuleLabels],
    ) -> std::result::Result<ClusterLayout, ClusterizationError> {
        let n_modules = labels.len();
        let state = CountingState::new(n_modules)?;

        self.install(|| {
            launch(n_modules, self.block_size(), |module| {
                if module < n_modules {
                    state.claim(module, labels[module].n_clusters);
                }
                Ok(())
            })
        })?;

        let counts = labels.iter().map(|l| l.n_clusters).collect();
        let layout = state.into_layout(counts)?;
        log::trace!("Module offsets: {:?}", layout.offsets());
        Ok(layout)
    }

    fn size(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
    ) -> std::result::Result<Vec<usize>, ClusterizationError> {
        check_module_count(cells, labels, layout)?;
        let flat = cells.flat_index()?;
        let state = SizingState::new(layout.total())?;

        self.install(|| {
            launch(flat.len(), self.block_size(), |task| {
                let Some(&FlatIndex { entry, position }) = flat.get(task) else {
                    return Ok(());
                };
                let cluster = layout.global_index(entry, labels[entry].labels[position])?;
                state.increment(cluster)
            })
        })?;

        Ok(state.into_sizes())
    }

    fn connect(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
        cluster_sizes: &[usize],
    ) -> std::result::Result<ClusterContainer, ClusterizationError> {
        check_module_count(cells, labels, layout)?;
        if cluster_sizes.len() != layout.total() {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "{} cluster sizes for {} clusters",
                cluster_sizes.len(),
                layout.total()
            )));
        }
        let owners = layout.owners()?;
        let state = ScatterState::new(cluster_sizes)?;
        let flat = cells.flat_index()?;
        let modules = cells.items();

        self.install(|| {
            launch(flat.len(), self.block_size(), |task| {
                let Some(&FlatIndex { entry, position }) = flat.get(task) else {
                    return Ok(());
                };
                let cluster = layout.global_index(entry, labels[entry].labels[position])?;
                state.write(cluster, modules[entry][position])
            })
        })?;

        state.into_clusters(owners)
    }

    fn create_measurements(
        &self,
        cells: &CellContainer,
        clusters: &ClusterContainer,
        layout: &ClusterLayout,
    ) -> std::result::Result<MeasurementContainer, ClusterizationError> {
        let headers = cells.headers();
        let items = self.install(|| {
            headers
                .par_iter()
                .enumerate()
                .map(|(module_index, module)| {
                    module_measurements(module_index, module, clusters, layout)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        })?;
        MeasurementContainer::from_parts(headers.to_vec(), items)
    }

    fn form_spacepoints(
        &self,
        measurements: &MeasurementContainer,
    ) -> std::result::Result<SpacepointContainer, ClusterizationError> {
        let headers = measurements.headers();
        let items = self.install(|| {
            headers
                .par_iter()
                .zip(measurements.items().par_iter())
                .enumerate()
                .map(|(module_index, (module, items))| {
                    module_spacepoints(module_index, module, items)
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        })?;
        SpacepointContainer::from_parts(headers.to_vec(), items)
    }
}
