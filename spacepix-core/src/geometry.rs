//! Module geometry: pixel segmentation and 3-D placement.
//!
//! Both tables are loaded by an external collaborator. This crate only
//! reads them, keyed by the module's geometry id.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rigid placement of a module in the global frame.
///
/// Formula:
/// global = rotation * local + translation
///
/// `rotation` is stored row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform3 {
    /// Row-major 3x3 rotation.
    pub rotation: [[f64; 3]; 3],
    /// Translation applied after rotation.
    pub translation: [f64; 3],
}

impl Default for Transform3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3 {
    const ORTHONORMAL_TOLERANCE: f64 = 1e-9;

    /// Create an identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Pure translation.
    #[must_use]
    pub fn from_translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Rotation by `angle` radians about the global z axis, then translation.
    #[must_use]
    pub fn rotation_z(angle: f64, translation: [f64; 3]) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            rotation: [[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
            translation,
        }
    }

    /// Builds a placement, checking that `rotation` is orthonormal.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransform`] if `R * R^T` deviates from the
    /// identity.
    pub fn new(rotation: [[f64; 3]; 3], translation: [f64; 3]) -> Result<Self> {
        let transform = Self {
            rotation,
            translation,
        };
        transform.validate()?;
        Ok(transform)
    }

    /// Checks that the rotation part is orthonormal.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransform`] naming the first offending entry.
    pub fn validate(&self) -> Result<()> {
        let r = &self.rotation;
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                if (dot - expected).abs() > Self::ORTHONORMAL_TOLERANCE || !dot.is_finite() {
                    return Err(Error::InvalidTransform(format!(
                        "rotation rows {i} and {j} have dot product {dot}, expected {expected}"
                    )));
                }
            }
        }
        if self.translation.iter().any(|t| !t.is_finite()) {
            return Err(Error::InvalidTransform(format!(
                "non-finite translation {:?}",
                self.translation
            )));
        }
        Ok(())
    }

    /// Maps a local point into the global frame.
    #[inline]
    #[must_use]
    pub fn point_to_global(&self, local: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let mut global = self.translation;
        for (row, out) in r.iter().zip(global.iter_mut()) {
            *out += row[0] * local[0] + row[1] * local[1] + row[2] * local[2];
        }
        global
    }

    /// Diagonal of `R * diag(variance) * R^T`.
    #[inline]
    #[must_use]
    pub fn variance_to_global(&self, variance: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let mut global = [0.0; 3];
        for (row, out) in r.iter().zip(global.iter_mut()) {
            *out = row[0] * row[0] * variance[0]
                + row[1] * row[1] * variance[1]
                + row[2] * row[2] * variance[2];
        }
        global
    }
}

/// Regular pixel grid of a module.
///
/// Local position of channel `(c0, c1)`:
/// `(min_center_x + c0 * pitch_x, min_center_y + c1 * pitch_y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelSegmentation {
    /// Local x of the centre of channel0 = 0.
    pub min_center_x: f64,
    /// Local y of the centre of channel1 = 0.
    pub min_center_y: f64,
    /// Pixel pitch along local x.
    pub pitch_x: f64,
    /// Pixel pitch along local y.
    pub pitch_y: f64,
}

impl Default for PixelSegmentation {
    fn default() -> Self {
        Self {
            min_center_x: 0.0,
            min_center_y: 0.0,
            pitch_x: 1.0,
            pitch_y: 1.0,
        }
    }
}

impl PixelSegmentation {
    /// Segmentation with the given pitch and origin at zero.
    #[must_use]
    pub fn with_pitch(pitch_x: f64, pitch_y: f64) -> Self {
        Self {
            pitch_x,
            pitch_y,
            ..Self::default()
        }
    }

    /// Local position of a channel centre.
    #[inline]
    #[must_use]
    pub fn position(&self, channel0: u32, channel1: u32) -> [f64; 2] {
        [
            self.min_center_x + f64::from(channel0) * self.pitch_x,
            self.min_center_y + f64::from(channel1) * self.pitch_y,
        ]
    }

    /// Variance of a uniform distribution over one pixel, per axis.
    #[inline]
    #[must_use]
    pub fn pitch_variance(&self) -> [f64; 2] {
        [
            self.pitch_x * self.pitch_x / 12.0,
            self.pitch_y * self.pitch_y / 12.0,
        ]
    }
}

/// Digitization entry for one module.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModuleDigitization {
    /// Pixel grid.
    pub segmentation: PixelSegmentation,
    /// Cells at or below this activation do not weight the centroid.
    #[cfg_attr(feature = "serde", serde(default))]
    pub threshold: f64,
}

/// Module header: everything the pipeline needs to know about one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    /// Detector-wide module identifier.
    pub geometry_id: u64,
    /// Pixel grid.
    pub segmentation: PixelSegmentation,
    /// Activation threshold for centroid weighting.
    pub threshold: f64,
    /// Placement in the global frame.
    pub placement: Transform3,
}

impl Module {
    /// Module with unit pitch, zero threshold and identity placement.
    #[must_use]
    pub fn new(geometry_id: u64) -> Self {
        Self {
            geometry_id,
            ..Self::default()
        }
    }

    /// Sets the pixel segmentation.
    #[must_use]
    pub fn with_segmentation(mut self, segmentation: PixelSegmentation) -> Self {
        self.segmentation = segmentation;
        self
    }

    /// Sets the activation threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the placement.
    #[must_use]
    pub fn with_placement(mut self, placement: Transform3) -> Self {
        self.placement = placement;
        self
    }

    /// Resolves a module header from the external lookup tables.
    ///
    /// # Errors
    /// Returns [`Error::UnknownModule`] if either table lacks `geometry_id`.
    pub fn resolve(
        geometry_id: u64,
        geometry: &DetectorGeometry,
        digitization: &DigitizationConfig,
    ) -> Result<Self> {
        let placement = geometry
            .placement(geometry_id)
            .ok_or(Error::UnknownModule {
                geometry_id,
                table: "geometry",
            })?;
        let digi = digitization
            .module(geometry_id)
            .ok_or(Error::UnknownModule {
                geometry_id,
                table: "digitization",
            })?;
        Ok(Self {
            geometry_id,
            segmentation: digi.segmentation,
            threshold: digi.threshold,
            placement: *placement,
        })
    }
}

/// Geometry id to placement lookup.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorGeometry {
    placements: BTreeMap<u64, Transform3>,
}

impl DetectorGeometry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a placement after validating it.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTransform`] for a non-orthonormal rotation.
    pub fn insert(&mut self, geometry_id: u64, placement: Transform3) -> Result<()> {
        placement.validate()?;
        self.placements.insert(geometry_id, placement);
        Ok(())
    }

    /// Looks up a placement.
    #[must_use]
    pub fn placement(&self, geometry_id: u64) -> Option<&Transform3> {
        self.placements.get(&geometry_id)
    }

    /// Number of modules described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

/// Geometry id to digitization lookup.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DigitizationConfig {
    modules: BTreeMap<u64, ModuleDigitization>,
}

impl DigitizationConfig {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the entry for a module.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for a non-positive or non-finite pitch.
    pub fn insert(&mut self, geometry_id: u64, digitization: ModuleDigitization) -> Result<()> {
        let seg = &digitization.segmentation;
        let valid = |pitch: f64| pitch.is_finite() && pitch > 0.0;
        if !(valid(seg.pitch_x) && valid(seg.pitch_y)) {
            return Err(Error::ConfigError(format!(
                "module {geometry_id:#x}: pitch ({}, {}) must be positive",
                seg.pitch_x, seg.pitch_y
            )));
        }
        self.modules.insert(geometry_id, digitization);
        Ok(())
    }

    /// Looks up a module entry.
    #[must_use]
    pub fn module(&self, geometry_id: u64) -> Option<&ModuleDigitization> {
        self.modules.get(&geometry_id)
    }

    /// Number of modules described.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
