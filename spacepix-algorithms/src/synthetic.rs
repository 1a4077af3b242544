//! Reproducible synthetic events for tests and benchmarks.

use std::collections::BTreeSet;
use std::f64::consts::TAU;

use spacepix_core::cell::sort_readout;
use spacepix_core::event::link_modules;
use spacepix_core::{Cell, CellContainer, Module, PixelSegmentation, Transform3};

/// Shape of a synthetic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticConfig {
    /// Number of modules.
    pub modules: usize,
    /// Approximate cell count per module.
    pub cells_per_module: usize,
    /// Channels per axis.
    pub width: u32,
    /// Generator seed.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            modules: 100,
            cells_per_module: 200,
            width: 1024,
            seed: 12345,
        }
    }
}

/// Linear congruential generator; same constants for a given seed on every
/// platform.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Creates a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next 31-bit value.
    #[allow(clippy::cast_possible_truncation)]
    pub fn next_u32(&mut self) -> u32 {
        self.state = (self.state.wrapping_mul(1_103_515_245).wrapping_add(12345)) & 0x7fff_ffff;
        self.state as u32
    }

    /// Uniform value in `0..bound`; `bound` must be non-zero.
    pub fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

/// Cells of one module: compact blobs of 1 to 4 cells at random positions,
/// deduplicated and in readout order.
fn module_cells(rng: &mut Lcg, target: usize, width: u32) -> Vec<Cell> {
    const BLOB: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

    let width = width.max(2);
    let capacity = (width as usize - 1) * (width as usize - 1);
    let target = target.min(capacity);
    let mut occupied = BTreeSet::new();
    let mut cells = Vec::with_capacity(target + BLOB.len());

    while cells.len() < target {
        let c0 = rng.below(width - 1);
        let c1 = rng.below(width - 1);
        let blob = 1 + rng.below(4) as usize;
        for &(d0, d1) in &BLOB[..blob] {
            if occupied.insert((c0 + d0, c1 + d1)) {
                let activation = 1.0 + f64::from(rng.below(1000)) / 10.0;
                let time = f64::from(rng.below(25));
                cells.push(Cell::new(c0 + d0, c1 + d1, activation).with_time(time));
            }
        }
    }

    sort_readout(&mut cells);
    cells
}

/// Builds a reproducible event: modules on concentric layers, rotated about
/// the beam axis, with 50 x 50 micron pixels.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn synthetic_event(config: &SyntheticConfig) -> CellContainer {
    let mut rng = Lcg::new(config.seed);
    let mut cells = CellContainer::with_capacity(config.modules);
    let segmentation = PixelSegmentation::with_pitch(0.05, 0.05);

    for index in 0..config.modules {
        let layer = (index % 4) as f64;
        let angle = TAU * f64::from(rng.below(360)) / 360.0;
        let radius = 30.0 + 40.0 * layer;
        let placement = Transform3::rotation_z(
            angle,
            [radius * angle.cos(), radius * angle.sin(), 10.0 * layer],
        );
        let module = Module::new(0x1000 + index as u64)
            .with_segmentation(segmentation)
            .with_threshold(5.0)
            .with_placement(placement);

        // Every fifth module is left empty.
        let target = if index % 5 == 4 {
            0
        } else {
            config.cells_per_module
        };
        cells.push(module, module_cells(&mut rng, target, config.width));
    }

    link_modules(&mut cells);
    cells
}
