//! Cluster reduction: measurement creation and spacepoint formation.
//!
//! Both execution models share these routines; they only differ in how
//! modules and clusters are distributed over workers.
#![allow(clippy::missing_errors_doc)]

use spacepix_core::{
    Cell, ClusterContainer, ClusterLayout, ClusterizationError, Measurement, MeasurementLink,
    Module, Spacepoint,
};

/// Running activation-weighted mean and spread.
#[derive(Debug, Default)]
struct WeightedMoments {
    total_weight: f64,
    mean: [f64; 2],
    spread: [f64; 2],
}

impl WeightedMoments {
    /// Non-positive weights are ignored.
    fn add(&mut self, position: [f64; 2], weight: f64) {
        if weight <= 0.0 {
            return;
        }
        self.total_weight += weight;
        let fraction = weight / self.total_weight;
        for k in 0..2 {
            let previous = self.mean[k];
            let diff = position[k] - previous;
            self.mean[k] = previous + fraction * diff;
            self.spread[k] += weight * diff * (position[k] - self.mean[k]);
        }
    }
}

/// Reduces one cluster to a measurement.
///
/// Cells with positive activation above the module threshold contribute with
/// their activation as weight. If none does, all cells contribute with unit
/// weight, so a measurement is always produced for a non-empty cluster.
///
/// `variance = weighted spread / total weight + pitch^2 / 12` per axis.
#[must_use]
pub fn reduce_cluster(cells: &[Cell], module: &Module, module_link: usize) -> Measurement {
    let segmentation = &module.segmentation;
    let mut moments = WeightedMoments::default();

    for cell in cells {
        if cell.activation > module.threshold {
            let position = segmentation.position(cell.channel0(), cell.channel1());
            moments.add(position, cell.activation);
        }
    }

    if moments.total_weight <= 0.0 {
        moments = WeightedMoments::default();
        for cell in cells {
            let position = segmentation.position(cell.channel0(), cell.channel1());
            moments.add(position, 1.0);
        }
    }

    let pitch_variance = segmentation.pitch_variance();
    let variance = [
        moments.spread[0] / moments.total_weight + pitch_variance[0],
        moments.spread[1] / moments.total_weight + pitch_variance[1],
    ];

    Measurement::new(moments.mean, variance, module_link)
}

/// Measurements of one module, in the module's label order.
///
/// Measurement `j` is the reduction of global cluster `offset + j`.
pub fn module_measurements(
    module_index: usize,
    module: &Module,
    clusters: &ClusterContainer,
    layout: &ClusterLayout,
) -> Result<Vec<Measurement>, ClusterizationError> {
    let range = layout.range(module_index);
    let mut measurements = Vec::new();
    measurements
        .try_reserve_exact(range.len())
        .map_err(ClusterizationError::allocation("module measurements"))?;

    for cluster in range {
        let cells = clusters
            .get(cluster)
            .ok_or(ClusterizationError::ClusterIndexOutOfRange {
                index: cluster,
                total: clusters.len(),
            })?;
        if clusters.header(cluster) != Some(&module_index) {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "cluster {cluster} is not owned by module {module_index}"
            )));
        }
        if cells.is_empty() {
            return Err(ClusterizationError::SlotUnderflow {
                cluster,
                written: 0,
                capacity: 0,
            });
        }
        measurements.push(reduce_cluster(cells, module, module_index));
    }
    Ok(measurements)
}

/// Lifts one measurement into the global frame.
///
/// The local point sits at `z = 0` in the module plane; variance is
/// propagated as the diagonal of `R * diag(vx, vy, 0) * R^T`.
#[must_use]
pub fn form_spacepoint(
    measurement: &Measurement,
    module: &Module,
    link: MeasurementLink,
) -> Spacepoint {
    let [x, y] = measurement.local;
    let [vx, vy] = measurement.variance;
    Spacepoint {
        global: module.placement.point_to_global([x, y, 0.0]),
        variance: module.placement.variance_to_global([vx, vy, 0.0]),
        measurement: link,
    }
}

/// Spacepoints of one module, one per measurement, in the same order.
pub fn module_spacepoints(
    module_index: usize,
    module: &Module,
    measurements: &[Measurement],
) -> Result<Vec<Spacepoint>, ClusterizationError> {
    let mut spacepoints = Vec::new();
    spacepoints
        .try_reserve_exact(measurements.len())
        .map_err(ClusterizationError::allocation("module spacepoints"))?;
    spacepoints.extend(measurements.iter().enumerate().map(|(index, measurement)| {
        form_spacepoint(
            measurement,
            module,
            MeasurementLink {
                module: module_index,
                index,
            },
        )
    }));
    Ok(spacepoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use spacepix_core::{PixelSegmentation, Transform3};

    #[test]
    fn test_single_cell_measurement() {
        let module = Module::new(1).with_segmentation(PixelSegmentation {
            min_center_x: 0.5,
            min_center_y: -0.5,
            pitch_x: 0.1,
            pitch_y: 0.2,
        });
        let m = reduce_cluster(&[Cell::new(10, 5, 3.0)], &module, 4);

        assert_abs_diff_eq!(m.local[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.local[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.variance[0], 0.01 / 12.0, epsilon = 1e-15);
        assert_abs_diff_eq!(m.variance[1], 0.04 / 12.0, epsilon = 1e-15);
        assert_eq!(m.module_link, 4);
    }

    #[test]
    fn test_weighted_centroid() {
        let module = Module::new(1);
        let cells = [Cell::new(0, 0, 30.0), Cell::new(2, 0, 10.0)];
        let m = reduce_cluster(&cells, &module, 0);

        // (0*30 + 2*10) / 40
        assert_abs_diff_eq!(m.local[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(m.local[1], 0.0, epsilon = 1e-12);
        // spread: (30*0.25 + 10*2.25) / 40 = 0.75
        assert_abs_diff_eq!(m.variance[0], 0.75 + 1.0 / 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.variance[1], 1.0 / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_threshold_excludes_cells() {
        let module = Module::new(1).with_threshold(5.0);
        let cells = [
            Cell::new(0, 0, 4.0),
            Cell::new(10, 0, 15.0),
            Cell::new(20, 0, 20.0),
        ];
        let m = reduce_cluster(&cells, &module, 0);

        // (10*15 + 20*20) / 35
        assert_abs_diff_eq!(m.local[0], 550.0 / 35.0, epsilon = 1e-9);
    }

    #[test]
    fn test_all_below_threshold_falls_back_to_mean() {
        let module = Module::new(1).with_threshold(10.0);
        let cells = [Cell::new(10, 20, 1.0), Cell::new(30, 40, 2.0)];
        let m = reduce_cluster(&cells, &module, 0);

        assert_abs_diff_eq!(m.local[0], 20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.local[1], 30.0, epsilon = 1e-12);
        assert!(m.variance.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_negative_threshold_ignores_non_positive_activation() {
        let module = Module::new(1).with_threshold(-10.0);
        let cells = [
            Cell::new(0, 0, -1.0),
            Cell::new(1, 0, 1.0),
            Cell::new(2, 0, 5.0),
        ];
        let m = reduce_cluster(&cells, &module, 0);

        // (1*1 + 2*5) / 6
        assert_abs_diff_eq!(m.local[0], 11.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.local[1], 0.0, epsilon = 1e-12);
        assert!(m.variance.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_non_positive_activations_fall_back_to_mean() {
        let module = Module::new(1).with_threshold(-10.0);
        let cells = [Cell::new(0, 0, -2.0), Cell::new(4, 0, 0.0)];
        let m = reduce_cluster(&cells, &module, 0);

        assert_abs_diff_eq!(m.local[0], 2.0, epsilon = 1e-12);
        assert!(m.local.iter().chain(&m.variance).all(|v| v.is_finite()));
    }

    #[test]
    fn test_spacepoint_translation() {
        let module = Module::new(1).with_placement(Transform3::from_translation([1.0, 2.0, 3.0]));
        let m = Measurement::new([0.5, -0.5], [0.1, 0.2], 0);
        let sp = form_spacepoint(&m, &module, MeasurementLink { module: 0, index: 0 });

        assert_abs_diff_eq!(sp.x(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.y(), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.z(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.variance[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.variance[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_module_measurements_rejects_foreign_cluster() {
        let mut clusters = ClusterContainer::new();
        clusters.push(1, vec![Cell::new(0, 0, 1.0)]);
        let layout = ClusterLayout::prefix_sum(&[1, 0]);

        let result = module_measurements(0, &Module::new(1), &clusters, &layout);
        assert!(matches!(
            result,
            Err(ClusterizationError::LayoutMismatch(_))
        ));
    }
}
