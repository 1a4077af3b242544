//! Cluster labels, the global cluster-id layout, and the cluster container.

use crate::cell::Cell;
use crate::error::ClusterizationError;
use crate::jagged::Jagged;

/// Clusters of one event: header = owning module index, items = member cells.
///
/// Cell order inside a cluster carries no meaning.
pub type ClusterContainer = Jagged<usize, Cell>;

/// Connected-component labels of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleLabels {
    /// Number of clusters found in the module.
    pub n_clusters: usize,
    /// One label per cell in `1..=n_clusters`, aligned with the module's cells.
    pub labels: Vec<u32>,
}

impl ModuleLabels {
    /// Labels for a module without cells.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Mapping of per-module cluster labels onto the global index space `[0, N)`.
///
/// Every module owns the range `offset..offset + count`. The ranges are
/// disjoint and cover `[0, N)`, but nothing orders them by module index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterLayout {
    offsets: Vec<usize>,
    counts: Vec<usize>,
    total: usize,
}

impl ClusterLayout {
    /// Exclusive prefix sum over `counts`, in module order.
    #[must_use]
    pub fn prefix_sum(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len());
        let mut total = 0usize;
        for &count in counts {
            offsets.push(total);
            total += count;
        }
        Self {
            offsets,
            counts: counts.to_vec(),
            total,
        }
    }

    /// Layout from offsets produced elsewhere, validated before use.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::LayoutMismatch`] if the ranges overlap,
    /// leave a gap, or do not end at `total`.
    pub fn from_offsets(
        offsets: Vec<usize>,
        counts: Vec<usize>,
        total: usize,
    ) -> Result<Self, ClusterizationError> {
        let layout = Self {
            offsets,
            counts,
            total,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Checks that the module ranges partition `[0, total)`.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::LayoutMismatch`] describing the first
    /// problem found.
    pub fn validate(&self) -> Result<(), ClusterizationError> {
        if self.offsets.len() != self.counts.len() {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "{} offsets for {} modules",
                self.offsets.len(),
                self.counts.len()
            )));
        }

        let mut ranges: Vec<(usize, usize)> = self
            .offsets
            .iter()
            .zip(&self.counts)
            .filter(|(_, &count)| count > 0)
            .map(|(&offset, &count)| (offset, count))
            .collect();
        ranges.sort_unstable();

        let mut next = 0usize;
        for (offset, count) in ranges {
            if offset != next {
                return Err(ClusterizationError::LayoutMismatch(format!(
                    "cluster range starting at {offset} expected at {next}"
                )));
            }
            next = offset + count;
        }
        if next != self.total {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "cluster ranges end at {next}, total is {}",
                self.total
            )));
        }
        Ok(())
    }

    /// Total number of clusters `N`.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of modules covered.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.counts.len()
    }

    /// First global index owned by `module`.
    #[must_use]
    pub fn offset(&self, module: usize) -> usize {
        self.offsets[module]
    }

    /// Number of clusters in `module`.
    #[must_use]
    pub fn count(&self, module: usize) -> usize {
        self.counts[module]
    }

    /// All per-module offsets.
    #[must_use]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// All per-module cluster counts.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Global index range owned by `module`.
    #[must_use]
    pub fn range(&self, module: usize) -> std::ops::Range<usize> {
        let offset = self.offsets[module];
        offset..offset + self.counts[module]
    }

    /// Global index of the cluster carrying `label` in `module`.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::LabelOutOfRange`] for a label outside
    /// `1..=count(module)`, and
    /// [`ClusterizationError::ClusterIndexOutOfRange`] if the result falls
    /// outside `[0, N)`.
    #[inline]
    pub fn global_index(&self, module: usize, label: u32) -> Result<usize, ClusterizationError> {
        let n_clusters = self.counts[module];
        let local = label as usize;
        if local == 0 || local > n_clusters {
            return Err(ClusterizationError::LabelOutOfRange {
                module,
                label,
                n_clusters,
            });
        }
        let index = self.offsets[module] + local - 1;
        if index >= self.total {
            return Err(ClusterizationError::ClusterIndexOutOfRange {
                index,
                total: self.total,
            });
        }
        Ok(index)
    }

    /// Owning module of every global cluster index.
    ///
    /// # Errors
    /// Returns [`ClusterizationError::Allocation`] if the table cannot be
    /// reserved, or [`ClusterizationError::LayoutMismatch`] if some index has
    /// no owner.
    pub fn owners(&self) -> Result<Vec<usize>, ClusterizationError> {
        let mut owners = Vec::new();
        owners
            .try_reserve_exact(self.total)
            .map_err(ClusterizationError::allocation("cluster headers"))?;
        owners.resize(self.total, usize::MAX);
        for module in 0..self.counts.len() {
            let range = self.range(module);
            if range.end > self.total {
                return Err(ClusterizationError::ClusterIndexOutOfRange {
                    index: range.end - 1,
                    total: self.total,
                });
            }
            owners[range].fill(module);
        }
        if let Some(index) = owners.iter().position(|&owner| owner == usize::MAX) {
            return Err(ClusterizationError::LayoutMismatch(format!(
                "cluster {index} has no owning module"
            )));
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_sum_layout() {
        let layout = ClusterLayout::prefix_sum(&[2, 0, 3]);
        assert_eq!(layout.total(), 5);
        assert_eq!(layout.offsets(), &[0, 2, 2]);
        assert_eq!(layout.range(2), 2..5);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.owners().unwrap(), vec![0, 0, 2, 2, 2]);
    }

    #[test]
    fn test_unordered_offsets_are_valid() {
        // Module 1 claimed the counter first.
        let layout = ClusterLayout::from_offsets(vec![3, 0], vec![2, 3], 5).unwrap();
        assert_eq!(layout.owners().unwrap(), vec![1, 1, 1, 0, 0]);
        assert_eq!(layout.global_index(0, 1).unwrap(), 3);
        assert_eq!(layout.global_index(1, 3).unwrap(), 2);
    }

    #[test]
    fn test_overlapping_offsets_rejected() {
        let result = ClusterLayout::from_offsets(vec![0, 1], vec![2, 2], 4);
        assert!(matches!(result, Err(ClusterizationError::LayoutMismatch(_))));
    }

    #[test]
    fn test_gap_rejected() {
        let result = ClusterLayout::from_offsets(vec![0, 3], vec![2, 2], 5);
        assert!(matches!(result, Err(ClusterizationError::LayoutMismatch(_))));
    }

    #[test]
    fn test_label_zero_rejected() {
        let layout = ClusterLayout::prefix_sum(&[1]);
        assert!(matches!(
            layout.global_index(0, 0),
            Err(ClusterizationError::LabelOutOfRange { label: 0, .. })
        ));
        assert!(matches!(
            layout.global_index(0, 2),
            Err(ClusterizationError::LabelOutOfRange { label: 2, .. })
        ));
    }

    #[test]
    fn test_empty_layout() {
        let layout = ClusterLayout::prefix_sum(&[0, 0]);
        assert_eq!(layout.total(), 0);
        assert!(layout.validate().is_ok());
        assert!(layout.owners().unwrap().is_empty());
    }
}
