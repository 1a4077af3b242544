//! Sequential reference clusterization.
//!
//! Single thread, fully deterministic: offsets come from an exclusive
//! prefix sum in module order and cells are appended in module order.

use spacepix_core::{
    CellContainer, ClusterContainer, ClusterLayout, Clusterization, ClusterizationConfig,
    ClusterizationError, MeasurementContainer, ModuleLabels, SpacepointContainer,
};

use crate::reduction::{module_measurements, module_spacepoints};
use crate::sparse_ccl::sparse_ccl;

/// Reference implementation of every pipeline stage.
#[derive(Debug, Clone, Default)]
pub struct SequentialClusterization {
    config: ClusterizationConfig,
}

impl SequentialClusterization {
    /// Create with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(config: ClusterizationConfig) -> Self {
        Self { config }
    }
}

/// Checks that stage inputs agree on the number of modules.
pub(crate) fn check_module_count(
    cells: &CellContainer,
    labels: &[ModuleLabels],
    layout: &ClusterLayout,
) -> Result<(), ClusterizationError> {
    if cells.len() != labels.len() || cells.len() != layout.module_count() {
        return Err(ClusterizationError::LayoutMismatch(format!(
            "{} cell modules, {} label sets, {} layout modules",
            cells.len(),
            labels.len(),
            layout.module_count()
        )));
    }
    for (module, ((_, module_cells), module_labels)) in cells.iter().zip(labels).enumerate() {
        if module_cells.len() != module_labels.labels.len() {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "module {module}: {} cells but {} labels",
                module_cells.len(),
                module_labels.labels.len()
            )));
        }
    }
    Ok(())
}

/// Exactly sized, empty cluster slots with their owning module as header.
pub(crate) fn allocate_clusters(
    layout: &ClusterLayout,
    cluster_sizes: &[usize],
) -> Result<ClusterContainer, ClusterizationError> {
    if cluster_sizes.len() != layout.total() {
        return Err(ClusterizationError::LayoutMismatch(format!(
            "{} cluster sizes for {} clusters",
            cluster_sizes.len(),
            layout.total()
        )));
    }
    let owners = layout.owners()?;

    let mut slots = Vec::new();
    slots
        .try_reserve_exact(cluster_sizes.len())
        .map_err(ClusterizationError::allocation("cluster slots"))?;
    for &size in cluster_sizes {
        let mut slot = Vec::new();
        slot.try_reserve_exact(size)
            .map_err(ClusterizationError::allocation("cluster cells"))?;
        slots.push(slot);
    }
    ClusterContainer::from_parts(owners, slots)
}

impl Clusterization for SequentialClusterization {
    fn name(&self) -> &'static str {
        "Sequential"
    }

    fn config(&self) -> &ClusterizationConfig {
        &self.config
    }

    fn label(&self, cells: &CellContainer) -> Result<Vec<ModuleLabels>, ClusterizationError> {
        let mut all_labels = Vec::new();
        all_labels
            .try_reserve_exact(cells.len())
            .map_err(ClusterizationError::allocation("module labels"))?;

        for (_, module_cells) in cells.iter() {
            let mut labels = Vec::new();
            labels
                .try_reserve_exact(module_cells.len())
                .map_err(ClusterizationError::allocation("cell labels"))?;
            labels.resize(module_cells.len(), 0);
            let n_clusters = sparse_ccl(module_cells, &mut labels);
            all_labels.push(ModuleLabels { n_clusters, labels });
        }
        Ok(all_labels)
    }

    fn count(&self, labels: &[ModuleLabels]) -> Result<ClusterLayout, ClusterizationError> {
        let counts: Vec<usize> = labels.iter().map(|l| l.n_clusters).collect();
        Ok(ClusterLayout::prefix_sum(&counts))
    }

    fn size(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
    ) -> Result<Vec<usize>, ClusterizationError> {
        check_module_count(cells, labels, layout)?;

        let mut sizes = Vec::new();
        sizes
            .try_reserve_exact(layout.total())
            .map_err(ClusterizationError::allocation("cluster sizes"))?;
        sizes.resize(layout.total(), 0usize);

        for (module, module_labels) in labels.iter().enumerate() {
            for &label in &module_labels.labels {
                sizes[layout.global_index(module, label)?] += 1;
            }
        }
        Ok(sizes)
    }

    fn connect(
        &self,
        cells: &CellContainer,
        labels: &[ModuleLabels],
        layout: &ClusterLayout,
        cluster_sizes: &[usize],
    ) -> Result<ClusterContainer, ClusterizationError> {
        check_module_count(cells, labels, layout)?;
        let (owners, mut slots) = allocate_clusters(layout, cluster_sizes)?.into_parts();

        for (module, ((_, module_cells), module_labels)) in
            cells.iter().zip(labels).enumerate()
        {
            for (cell, &label) in module_cells.iter().zip(&module_labels.labels) {
                let cluster = layout.global_index(module, label)?;
                let slot = &mut slots[cluster];
                if slot.len() == cluster_sizes[cluster] {
                    return Err(ClusterizationError::SlotOverflow {
                        cluster,
                        capacity: cluster_sizes[cluster],
                    });
                }
                slot.push(*cell);
            }
        }

        if let Some((cluster, slot)) = slots
            .iter()
            .enumerate()
            .find(|(cluster, slot)| slot.len() != cluster_sizes[*cluster])
        {
            return Err(ClusterizationError::SlotUnderflow {
                cluster,
                written: slot.len(),
                capacity: cluster_sizes[cluster],
            });
        }

        ClusterContainer::from_parts(owners, slots)
    }

    fn create_measurements(
        &self,
        cells: &CellContainer,
        clusters: &ClusterContainer,
        layout: &ClusterLayout,
    ) -> Result<MeasurementContainer, ClusterizationError> {
        let mut measurements = MeasurementContainer::with_capacity(cells.len());
        for (module_index, (module, _)) in cells.iter().enumerate() {
            let items = module_measurements(module_index, module, clusters, layout)?;
            measurements.push(*module, items);
        }
        Ok(measurements)
    }

    fn form_spacepoints(
        &self,
        measurements: &MeasurementContainer,
    ) -> Result<SpacepointContainer, ClusterizationError> {
        let mut spacepoints = SpacepointContainer::with_capacity(measurements.len());
        for (module_index, (module, items)) in measurements.iter().enumerate() {
            spacepoints.push(*module, module_spacepoints(module_index, module, items)?);
        }
        Ok(spacepoints)
    }
}
