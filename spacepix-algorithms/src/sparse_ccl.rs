//! Sparse connected-component labeling.
//!
//! Cells arrive in readout order (`channel1`, then `channel0`), so every
//! 8-connected neighbour of a cell that precedes it lies at most one row
//! back. The sweep only looks backwards until the row gap exceeds one,
//! which keeps the cost near-linear in the number of cells.

use std::cmp::Ordering;

use spacepix_core::{Cell, ModuleLabels};

/// Labels one module's cells in place.
///
/// `labels` must have one slot per cell. On return every slot holds a label
/// in `1..=n` and `n` is returned. Labels are numbered in order of the first
/// cell of each cluster.
///
/// # Panics
/// Panics if `labels.len() != cells.len()`.
pub fn sparse_ccl(cells: &[Cell], labels: &mut [u32]) -> usize {
    assert_eq!(
        cells.len(),
        labels.len(),
        "one label slot is required per cell"
    );
    if cells.is_empty() {
        return 0;
    }

    let mut uf = UnionFind::new(cells.len());

    for j in 1..cells.len() {
        let cell = &cells[j];
        for i in (0..j).rev() {
            let previous = &cells[i];
            if previous.is_far_behind(cell) {
                break;
            }
            if previous.is_adjacent(cell) {
                uf.union(i, j);
            }
        }
    }

    // Roots always sit at the lowest index of their set, so a forward pass
    // sees each root before any of its members.
    let mut n_clusters = 0u32;
    for i in 0..cells.len() {
        let root = uf.find(i);
        if root == i {
            n_clusters += 1;
            labels[i] = n_clusters;
        } else {
            labels[i] = labels[root];
        }
    }
    n_clusters as usize
}

/// Convenience wrapper returning freshly allocated labels.
#[must_use]
pub fn label_module(cells: &[Cell]) -> ModuleLabels {
    let mut labels = vec![0; cells.len()];
    let n_clusters = sparse_ccl(cells, &mut labels);
    ModuleLabels { n_clusters, labels }
}

/// Union-find whose roots are always the smallest index of their set.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression.
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, x: usize, y: usize) {
        let px = self.find(x);
        let py = self.find(y);

        match px.cmp(&py) {
            Ordering::Equal => {}
            Ordering::Less => self.parent[py] = px,
            Ordering::Greater => self.parent[px] = py,
        }
    }
}
