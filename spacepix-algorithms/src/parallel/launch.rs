//! Kernel-style launches on top of rayon.
//!
//! A launch runs one task per index of a grid rounded up to whole blocks and
//! returns only after every task finished. That return is the only barrier
//! between stages. Kernels must ignore indices past their item count.

use rayon::prelude::*;
use spacepix_core::ClusterizationError;

/// Grid geometry of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    /// Number of blocks.
    pub blocks: usize,
    /// Tasks per block.
    pub block_size: usize,
}

impl LaunchGrid {
    /// Smallest grid of `block_size`-wide blocks covering `n_items`.
    ///
    /// A zero block size is treated as one.
    #[must_use]
    pub fn cover(n_items: usize, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            blocks: n_items.div_ceil(block_size),
            block_size,
        }
    }

    /// Total task count, including padding past the item count.
    #[must_use]
    pub fn tasks(&self) -> usize {
        self.blocks * self.block_size
    }
}

/// Runs `kernel(global_index)` for every task of the grid covering `n_items`.
///
/// Blocks run concurrently; tasks within a block run in order on one worker.
///
/// # Errors
/// Returns the first error reported by any task.
pub fn launch<K>(n_items: usize, block_size: usize, kernel: K) -> Result<(), ClusterizationError>
where
    K: Fn(usize) -> Result<(), ClusterizationError> + Sync + Send,
{
    let grid = LaunchGrid::cover(n_items, block_size);
    (0..grid.blocks).into_par_iter().try_for_each(|block| {
        let first = block * grid.block_size;
        (first..first + grid.block_size).try_for_each(&kernel)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_grid_rounds_up() {
        let grid = LaunchGrid::cover(100, 32);
        assert_eq!(grid.blocks, 4);
        assert_eq!(grid.tasks(), 128);
        assert_eq!(LaunchGrid::cover(0, 32).tasks(), 0);
        assert_eq!(LaunchGrid::cover(5, 0).tasks(), 5);
    }

    #[test]
    fn test_every_task_runs_once() {
        let visited = AtomicUsize::new(0);
        let in_range = AtomicUsize::new(0);
        launch(100, 32, |index| {
            visited.fetch_add(1, Ordering::Relaxed);
            if index < 100 {
                in_range.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(visited.load(Ordering::Relaxed), 128);
        assert_eq!(in_range.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_error_propagates() {
        let result = launch(10, 4, |index| {
            if index == 7 {
                Err(ClusterizationError::ClusterIndexOutOfRange { index, total: 7 })
            } else {
                Ok(())
            }
        });
        assert!(matches!(
            result,
            Err(ClusterizationError::ClusterIndexOutOfRange { index: 7, .. })
        ));
    }
}
