//! Per-event cell input.

use crate::cell::Cell;
use crate::error::Result;
use crate::geometry::{DetectorGeometry, DigitizationConfig, Module};
use crate::jagged::Jagged;

/// Cells per module, in readout order.
pub type CellContainer = Jagged<Module, Cell>;

/// Assembles a [`CellContainer`] from geometry ids and raw cells.
///
/// Module headers are resolved from the detector and digitization tables and
/// every cell is stamped with its module index. Cells must already be in
/// readout order (`channel1`, then `channel0`).
pub struct EventBuilder<'a> {
    geometry: &'a DetectorGeometry,
    digitization: &'a DigitizationConfig,
    cells: CellContainer,
}

impl<'a> EventBuilder<'a> {
    /// Starts an empty event.
    #[must_use]
    pub fn new(geometry: &'a DetectorGeometry, digitization: &'a DigitizationConfig) -> Self {
        Self {
            geometry,
            digitization,
            cells: CellContainer::new(),
        }
    }

    /// Adds one module and its cells.
    ///
    /// # Errors
    /// Returns [`Error::UnknownModule`](crate::Error::UnknownModule) if
    /// `geometry_id` is missing from either table.
    pub fn add_module(&mut self, geometry_id: u64, mut cells: Vec<Cell>) -> Result<&mut Self> {
        let module = Module::resolve(geometry_id, self.geometry, self.digitization)?;
        debug_assert!(
            crate::cell::is_readout_sorted(&cells),
            "cells of module {geometry_id:#x} are not in readout order"
        );
        let module_index = self.cells.len();
        for cell in &mut cells {
            cell.module_index = module_index;
        }
        self.cells.push(module, cells);
        Ok(self)
    }

    /// Number of modules added so far.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.cells.len()
    }

    /// Finishes the event.
    #[must_use]
    pub fn build(self) -> CellContainer {
        self.cells
    }
}

/// Stamps module indices onto a container assembled by hand.
pub fn link_modules(cells: &mut CellContainer) {
    let (headers, mut items) = std::mem::take(cells).into_parts();
    for (module_index, module_cells) in items.iter_mut().enumerate() {
        for cell in module_cells {
            cell.module_index = module_index;
        }
    }
    *cells = headers.into_iter().zip(items).collect();
}
