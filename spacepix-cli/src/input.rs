//! JSON event files.
//!
//! An event file carries the geometry and digitization tables together with
//! the raw cells of every module:
//!
//! ```json
//! {
//!   "geometry": [{ "geometry_id": 1, "translation": [0.0, 0.0, 30.0] }],
//!   "digitization": [{ "geometry_id": 1, "pitch": [0.05, 0.05], "threshold": 0.5 }],
//!   "modules": [{ "geometry_id": 1, "cells": [[0, 0, 1.0], [0, 1, 2.5]] }]
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use spacepix_core::cell::sort_readout;
use spacepix_core::{
    Cell, CellContainer, DetectorGeometry, DigitizationConfig, EventBuilder, ModuleDigitization,
    PixelSegmentation, Spacepoint, SpacepointContainer, Transform3,
};

use crate::Result;

fn identity_rotation() -> [[f64; 3]; 3] {
    Transform3::identity().rotation
}

/// Placement of one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementInput {
    pub geometry_id: u64,
    #[serde(default = "identity_rotation")]
    pub rotation: [[f64; 3]; 3],
    #[serde(default)]
    pub translation: [f64; 3],
}

/// Segmentation and threshold of one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitizationInput {
    pub geometry_id: u64,
    pub pitch: [f64; 2],
    #[serde(default)]
    pub min_center: [f64; 2],
    #[serde(default)]
    pub threshold: f64,
}

/// One cell as `[channel0, channel1, activation]` or with a trailing time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellInput {
    Plain(u32, u32, f64),
    Timed(u32, u32, f64, f64),
}

impl From<CellInput> for Cell {
    fn from(cell: CellInput) -> Self {
        match cell {
            CellInput::Plain(c0, c1, activation) => Cell::new(c0, c1, activation),
            CellInput::Timed(c0, c1, activation, time) => {
                Cell::new(c0, c1, activation).with_time(time)
            }
        }
    }
}

/// Cells of one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInput {
    pub geometry_id: u64,
    #[serde(default)]
    pub cells: Vec<CellInput>,
}

/// A whole event file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventInput {
    #[serde(default)]
    pub geometry: Vec<PlacementInput>,
    #[serde(default)]
    pub digitization: Vec<DigitizationInput>,
    #[serde(default)]
    pub modules: Vec<ModuleInput>,
}

impl EventInput {
    /// Reads an event file.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Resolves modules against the tables and assembles the cell container.
    ///
    /// Cells are put into readout order first; duplicate geometry ids in the
    /// module list become separate modules.
    pub fn build(&self) -> Result<CellContainer> {
        let mut geometry = DetectorGeometry::new();
        for entry in &self.geometry {
            geometry.insert(
                entry.geometry_id,
                Transform3::new(entry.rotation, entry.translation)?,
            )?;
        }

        let mut digitization = DigitizationConfig::new();
        for entry in &self.digitization {
            digitization.insert(
                entry.geometry_id,
                ModuleDigitization {
                    segmentation: PixelSegmentation {
                        min_center_x: entry.min_center[0],
                        min_center_y: entry.min_center[1],
                        pitch_x: entry.pitch[0],
                        pitch_y: entry.pitch[1],
                    },
                    threshold: entry.threshold,
                },
            )?;
        }

        let mut builder = EventBuilder::new(&geometry, &digitization);
        for module in &self.modules {
            let mut cells: Vec<Cell> = module.cells.iter().copied().map(Cell::from).collect();
            sort_readout(&mut cells);
            builder.add_module(module.geometry_id, cells)?;
        }
        log::debug!(
            "Loaded {} modules ({} placements, {} digitization entries)",
            builder.module_count(),
            geometry.len(),
            digitization.len()
        );
        Ok(builder.build())
    }
}

/// Spacepoints of one module in the output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpacepoints {
    pub geometry_id: u64,
    pub spacepoints: Vec<Spacepoint>,
}

/// Writes spacepoints grouped by module as pretty-printed JSON.
pub fn write_spacepoints(path: &Path, spacepoints: &SpacepointContainer) -> Result<()> {
    let modules: Vec<ModuleSpacepoints> = spacepoints
        .iter()
        .map(|(module, points)| ModuleSpacepoints {
            geometry_id: module.geometry_id,
            spacepoints: points.to_vec(),
        })
        .collect();

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &modules)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacepix_algorithms::{cluster_event, ClusterizationConfig, ExecutionModel};
    use tempfile::NamedTempFile;

    const EVENT: &str = r#"{
        "geometry": [
            { "geometry_id": 1, "translation": [0.0, 0.0, 30.0] },
            { "geometry_id": 2 }
        ],
        "digitization": [
            { "geometry_id": 1, "pitch": [0.5, 0.5] },
            { "geometry_id": 2, "pitch": [1.0, 1.0], "threshold": 0.5 }
        ],
        "modules": [
            { "geometry_id": 1, "cells": [[5, 5, 1.0], [0, 1, 1.0], [0, 0, 1.0, 12.5]] },
            { "geometry_id": 2 }
        ]
    }"#;

    fn event_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(EVENT.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_build() {
        let file = event_file();
        let input = EventInput::load(file.path()).unwrap();
        assert_eq!(input.modules.len(), 2);

        let cells = input.build().unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells.sizes(), vec![3, 0]);

        // Sorted into readout order, time kept.
        let module = cells.get(0).unwrap();
        assert_eq!((module[0].channel0(), module[0].channel1()), (0, 0));
        assert!((module[0].time - 12.5).abs() < 1e-12);
        assert_eq!((module[2].channel0(), module[2].channel1()), (5, 5));
        assert!((cells.header(0).unwrap().segmentation.pitch_x - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_module_fails() {
        let input = EventInput {
            modules: vec![ModuleInput {
                geometry_id: 9,
                cells: Vec::new(),
            }],
            ..EventInput::default()
        };
        assert!(matches!(
            input.build(),
            Err(crate::CliError::Core(spacepix_core::Error::UnknownModule { .. }))
        ));
    }

    #[test]
    fn test_write_spacepoints() {
        let input: EventInput = serde_json::from_str(EVENT).unwrap();
        let cells = input.build().unwrap();
        let output = cluster_event(
            &cells,
            ExecutionModel::Sequential,
            &ClusterizationConfig::default(),
        )
        .unwrap();

        let out = NamedTempFile::new().unwrap();
        write_spacepoints(out.path(), &output.spacepoints).unwrap();

        let text = std::fs::read_to_string(out.path()).unwrap();
        let modules: Vec<ModuleSpacepoints> = serde_json::from_str(&text).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].geometry_id, 1);
        assert_eq!(modules[0].spacepoints.len(), 2);
        assert!((modules[0].spacepoints[0].z() - 30.0).abs() < 1e-12);
        assert!(modules[1].spacepoints.is_empty());
    }
}
