//! Output checks shared by the test suite and the `compare` command.
//!
//! The two execution models agree on cluster contents, not on storage
//! order, so clusters are compared as canonical `(module, sorted cells)`
//! pairs. Measurements and spacepoints follow label order in both models
//! and are compared index by index within a tolerance.

use std::collections::BTreeSet;

use spacepix_core::{CellContainer, ClusterContainer, EventOutput, Spacepoint};
use thiserror::Error;

/// A cluster independent of storage order: owning module plus the sorted
/// `(channel0, channel1)` pairs of its cells.
pub type CanonicalCluster = (usize, Vec<(u32, u32)>);

/// A violated output property.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// A label outside `1..=n_clusters`.
    #[error("module {module}: label {label} outside 1..={n_clusters}")]
    LabelRange {
        /// Module index.
        module: usize,
        /// Offending label.
        label: u32,
        /// Cluster count reported for the module.
        n_clusters: usize,
    },

    /// A label in `1..=n_clusters` carried by no cell.
    #[error("module {module}: label {label} is unused")]
    UnusedLabel {
        /// Module index.
        module: usize,
        /// Label no cell carries.
        label: u32,
    },

    /// Sizing pass disagrees with the cell count.
    #[error("cluster sizes sum to {sizes} but the event has {cells} cells")]
    SizeSum {
        /// Sum of all cluster sizes.
        sizes: usize,
        /// Cells in the event.
        cells: usize,
    },

    /// A cluster whose stored cells differ from its computed size.
    #[error("cluster {cluster}: size {expected} but {actual} cells stored")]
    ClusterSize {
        /// Global cluster index.
        cluster: usize,
        /// Size from the sizing pass.
        expected: usize,
        /// Cells actually stored.
        actual: usize,
    },

    /// A module whose clusters do not partition its cells.
    #[error("module {module}: clusters do not partition its cells")]
    Coverage {
        /// Module index.
        module: usize,
    },

    /// The two outputs disagree on cluster contents.
    #[error("cluster sets differ: {only_left} clusters only on the left, {only_right} only on the right")]
    ClusterSets {
        /// Clusters found only in the left output.
        only_left: usize,
        /// Clusters found only in the right output.
        only_right: usize,
    },

    /// Different measurement counts for one module.
    #[error("module {module}: {left} measurements vs {right}")]
    MeasurementCount {
        /// Module index.
        module: usize,
        /// Count in the left output.
        left: usize,
        /// Count in the right output.
        right: usize,
    },

    /// A measurement outside tolerance.
    #[error("module {module}: measurement {index} differs")]
    Measurement {
        /// Module index.
        module: usize,
        /// Measurement index within the module.
        index: usize,
    },

    /// A spacepoint outside tolerance or with a different link.
    #[error("module {module}: spacepoint {index} differs")]
    Spacepoint {
        /// Module index.
        module: usize,
        /// Spacepoint index within the module.
        index: usize,
    },
}

/// Canonical form of every cluster, sorted.
#[must_use]
pub fn canonical_clusters(clusters: &ClusterContainer) -> Vec<CanonicalCluster> {
    let mut canonical: Vec<CanonicalCluster> = clusters
        .iter()
        .map(|(&module, cells)| {
            let mut channels: Vec<(u32, u32)> = cells
                .iter()
                .map(|c| (c.channel0(), c.channel1()))
                .collect();
            channels.sort_unstable();
            (module, channels)
        })
        .collect();
    canonical.sort();
    canonical
}

/// Checks the single-run properties of `output` against its input.
///
/// * labels of each module are exactly `1..=n_clusters`
/// * cluster sizes sum to the cell count and match stored cluster lengths
/// * each module's clusters partition that module's cells
///
/// # Errors
/// Returns the first violated property.
pub fn check_output(cells: &CellContainer, output: &EventOutput) -> Result<(), Mismatch> {
    for (module, labels) in output.labels.iter().enumerate() {
        let mut seen = vec![false; labels.n_clusters];
        for &label in &labels.labels {
            let slot = (label as usize)
                .checked_sub(1)
                .and_then(|i| seen.get_mut(i))
                .ok_or(Mismatch::LabelRange {
                    module,
                    label,
                    n_clusters: labels.n_clusters,
                })?;
            *slot = true;
        }
        if let Some(unused) = seen.iter().position(|&s| !s) {
            return Err(Mismatch::UnusedLabel {
                module,
                label: u32::try_from(unused + 1).unwrap_or(u32::MAX),
            });
        }
    }

    let total: usize = output.cluster_sizes.iter().sum();
    if total != cells.total_size() {
        return Err(Mismatch::SizeSum {
            sizes: total,
            cells: cells.total_size(),
        });
    }
    for (cluster, (&expected, (_, stored))) in
        output.cluster_sizes.iter().zip(output.clusters.iter()).enumerate()
    {
        if expected != stored.len() {
            return Err(Mismatch::ClusterSize {
                cluster,
                expected,
                actual: stored.len(),
            });
        }
    }

    let mut per_module: Vec<Vec<(u32, u32)>> = vec![Vec::new(); cells.len()];
    for (&module, stored) in output.clusters.iter() {
        let target = per_module
            .get_mut(module)
            .ok_or(Mismatch::Coverage { module })?;
        target.extend(stored.iter().map(|c| (c.channel0(), c.channel1())));
    }
    for (module, ((_, module_cells), mut clustered)) in
        cells.iter().zip(per_module).enumerate()
    {
        let mut expected: Vec<(u32, u32)> = module_cells
            .iter()
            .map(|c| (c.channel0(), c.channel1()))
            .collect();
        expected.sort_unstable();
        clustered.sort_unstable();
        if expected != clustered {
            return Err(Mismatch::Coverage { module });
        }
    }
    Ok(())
}

fn spacepoints_match(left: &Spacepoint, right: &Spacepoint, epsilon: f64) -> bool {
    left.measurement == right.measurement
        && left
            .global
            .iter()
            .chain(&left.variance)
            .zip(right.global.iter().chain(&right.variance))
            .all(|(a, b)| (a - b).abs() <= epsilon)
}

/// Checks that two runs on the same event agree.
///
/// Cluster sets must be equal; measurements and spacepoints must match
/// within `epsilon`.
///
/// # Errors
/// Returns the first disagreement found.
pub fn compare_outputs(
    left: &EventOutput,
    right: &EventOutput,
    epsilon: f64,
) -> Result<(), Mismatch> {
    let left_clusters: BTreeSet<CanonicalCluster> =
        canonical_clusters(&left.clusters).into_iter().collect();
    let right_clusters: BTreeSet<CanonicalCluster> =
        canonical_clusters(&right.clusters).into_iter().collect();
    if left_clusters != right_clusters || left.clusters.len() != right.clusters.len() {
        return Err(Mismatch::ClusterSets {
            only_left: left_clusters.difference(&right_clusters).count(),
            only_right: right_clusters.difference(&left_clusters).count(),
        });
    }

    let modules = left.measurements.len().max(right.measurements.len());
    for module in 0..modules {
        let l = left.measurements.get(module).unwrap_or_default();
        let r = right.measurements.get(module).unwrap_or_default();
        if l.len() != r.len() {
            return Err(Mismatch::MeasurementCount {
                module,
                left: l.len(),
                right: r.len(),
            });
        }
        if let Some(index) = l.iter().zip(r).position(|(a, b)| !a.approx_eq(b, epsilon)) {
            return Err(Mismatch::Measurement { module, index });
        }

        let l = left.spacepoints.get(module).unwrap_or_default();
        let r = right.spacepoints.get(module).unwrap_or_default();
        if l.len() != r.len() {
            return Err(Mismatch::Spacepoint {
                module,
                index: l.len().min(r.len()),
            });
        }
        if let Some(index) = l
            .iter()
            .zip(r)
            .position(|(a, b)| !spacepoints_match(a, b, epsilon))
        {
            return Err(Mismatch::Spacepoint { module, index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacepix_core::{Cell, Clusterization, Module};

    use crate::SequentialClusterization;

    fn event() -> CellContainer {
        let mut cells = CellContainer::new();
        cells.push(
            Module::new(1),
            vec![
                Cell::new(0, 0, 1.0),
                Cell::new(0, 1, 1.0),
                Cell::new(5, 5, 1.0),
            ],
        );
        cells
    }

    #[test]
    fn test_canonical_order_is_storage_independent() {
        let mut a = ClusterContainer::new();
        a.push(0, vec![Cell::new(1, 0, 1.0), Cell::new(0, 0, 1.0)]);
        a.push(0, vec![Cell::new(5, 5, 1.0)]);
        let mut b = ClusterContainer::new();
        b.push(0, vec![Cell::new(5, 5, 1.0)]);
        b.push(0, vec![Cell::new(0, 0, 1.0), Cell::new(1, 0, 1.0)]);

        assert_eq!(canonical_clusters(&a), canonical_clusters(&b));
    }

    #[test]
    fn test_valid_output_passes() {
        let cells = event();
        let output = SequentialClusterization::new().run(&cells).unwrap();
        assert_eq!(check_output(&cells, &output), Ok(()));
        assert_eq!(compare_outputs(&output, &output, 0.0), Ok(()));
    }

    #[test]
    fn test_detects_bad_sizes() {
        let cells = event();
        let mut output = SequentialClusterization::new().run(&cells).unwrap();
        output.cluster_sizes[0] += 1;
        assert!(matches!(
            check_output(&cells, &output),
            Err(Mismatch::SizeSum { sizes: 4, cells: 3 })
        ));
    }

    #[test]
    fn test_detects_moved_measurement() {
        let cells = event();
        let left = SequentialClusterization::new().run(&cells).unwrap();
        let (headers, mut items) = left.measurements.clone().into_parts();
        items[0][1].local[0] += 0.5;
        let mut right = left.clone();
        right.measurements = spacepix_core::MeasurementContainer::from_parts(headers, items).unwrap();

        assert_eq!(
            compare_outputs(&left, &right, 1e-9),
            Err(Mismatch::Measurement {
                module: 0,
                index: 1
            })
        );
    }
}
