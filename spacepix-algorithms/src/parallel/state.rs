//! Shared state written by parallel kernels.
//!
//! Each object is shared by reference across every task of one stage and is
//! only mutated through atomic fetch-and-add (plus write-once slots for the
//! scatter). Stage results are read back only after the launch returned, so
//! relaxed ordering is sufficient everywhere.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use spacepix_core::{Cell, ClusterContainer, ClusterLayout, ClusterizationError};

fn atomic_zeros(len: usize, what: &'static str) -> Result<Vec<AtomicUsize>, ClusterizationError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(ClusterizationError::allocation(what))?;
    values.extend((0..len).map(|_| AtomicUsize::new(0)));
    Ok(values)
}

/// Global cluster counter and the offset each module claimed from it.
pub struct CountingState {
    total: AtomicUsize,
    offsets: Vec<AtomicUsize>,
}

impl CountingState {
    /// Zeroed counter for `n_modules` modules.
    pub fn new(n_modules: usize) -> Result<Self, ClusterizationError> {
        Ok(Self {
            total: AtomicUsize::new(0),
            offsets: atomic_zeros(n_modules, "module offsets")?,
        })
    }

    /// Claims `n_clusters` consecutive global ids for `module`.
    ///
    /// Returns the first claimed id. Claims from different modules never
    /// overlap, but their order follows task scheduling, not module index.
    #[inline]
    pub fn claim(&self, module: usize, n_clusters: usize) -> usize {
        let offset = self.total.fetch_add(n_clusters, Ordering::Relaxed);
        self.offsets[module].store(offset, Ordering::Relaxed);
        offset
    }

    /// Freezes the claims into a validated layout.
    pub fn into_layout(self, counts: Vec<usize>) -> Result<ClusterLayout, ClusterizationError> {
        let total = self.total.into_inner();
        let offsets = self
            .offsets
            .into_iter()
            .map(AtomicUsize::into_inner)
            .collect();
        ClusterLayout::from_offsets(offsets, counts, total)
    }
}

/// Per-cluster cell tallies.
pub struct SizingState {
    sizes: Vec<AtomicUsize>,
}

impl SizingState {
    /// Zeroed tallies for `n_clusters` clusters.
    pub fn new(n_clusters: usize) -> Result<Self, ClusterizationError> {
        Ok(Self {
            sizes: atomic_zeros(n_clusters, "cluster sizes")?,
        })
    }

    /// Counts one cell for `cluster`.
    #[inline]
    pub fn increment(&self, cluster: usize) -> Result<(), ClusterizationError> {
        let size = self
            .sizes
            .get(cluster)
            .ok_or(ClusterizationError::ClusterIndexOutOfRange {
                index: cluster,
                total: self.sizes.len(),
            })?;
        size.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Final tallies.
    #[must_use]
    pub fn into_sizes(self) -> Vec<usize> {
        self.sizes.into_iter().map(AtomicUsize::into_inner).collect()
    }
}

/// Exactly sized cluster storage with one write cursor per cluster.
///
/// Cells of cluster `i` occupy `starts[i]..starts[i] + capacities[i]` of a
/// flat array of write-once slots.
pub struct ScatterState {
    starts: Vec<usize>,
    capacities: Vec<usize>,
    cursors: Vec<AtomicUsize>,
    slots: Vec<OnceLock<Cell>>,
}

impl ScatterState {
    /// Allocates storage for clusters of the given sizes.
    pub fn new(cluster_sizes: &[usize]) -> Result<Self, ClusterizationError> {
        let mut starts = Vec::new();
        starts
            .try_reserve_exact(cluster_sizes.len())
            .map_err(ClusterizationError::allocation("cluster starts"))?;
        let mut total = 0usize;
        for &size in cluster_sizes {
            starts.push(total);
            total += size;
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(total)
            .map_err(ClusterizationError::allocation("cluster cells"))?;
        slots.extend((0..total).map(|_| OnceLock::new()));

        Ok(Self {
            starts,
            capacities: cluster_sizes.to_vec(),
            cursors: atomic_zeros(cluster_sizes.len(), "write cursors")?,
            slots,
        })
    }

    /// Writes `cell` into the next free position of `cluster`.
    #[inline]
    pub fn write(&self, cluster: usize, cell: Cell) -> Result<(), ClusterizationError> {
        let capacity = *self
            .capacities
            .get(cluster)
            .ok_or(ClusterizationError::ClusterIndexOutOfRange {
                index: cluster,
                total: self.capacities.len(),
            })?;
        let position = self.cursors[cluster].fetch_add(1, Ordering::Relaxed);
        if position >= capacity {
            return Err(ClusterizationError::SlotOverflow { cluster, capacity });
        }
        self.slots[self.starts[cluster] + position]
            .set(cell)
            .map_err(|_| ClusterizationError::SlotConflict { cluster, position })
    }

    /// Collects the written cells into a cluster container.
    ///
    /// Fails if any cluster received fewer cells than its capacity.
    pub fn into_clusters(self, owners: Vec<usize>) -> Result<ClusterContainer, ClusterizationError> {
        let Self {
            capacities,
            cursors,
            slots,
            ..
        } = self;

        for (cluster, (cursor, &capacity)) in cursors.into_iter().zip(&capacities).enumerate() {
            let written = cursor.into_inner();
            if written != capacity {
                return Err(ClusterizationError::SlotUnderflow {
                    cluster,
                    written,
                    capacity,
                });
            }
        }

        let mut cells = slots.into_iter().map(OnceLock::into_inner);
        let mut clusters = Vec::new();
        clusters
            .try_reserve_exact(capacities.len())
            .map_err(ClusterizationError::allocation("cluster slots"))?;
        for (cluster, &capacity) in capacities.iter().enumerate() {
            let mut members = Vec::new();
            members
                .try_reserve_exact(capacity)
                .map_err(ClusterizationError::allocation("cluster cells"))?;
            for written in 0..capacity {
                let cell = cells.next().flatten().ok_or(ClusterizationError::SlotUnderflow {
                    cluster,
                    written,
                    capacity,
                })?;
                members.push(cell);
            }
            clusters.push(members);
        }
        ClusterContainer::from_parts(owners, clusters)
    }
}
