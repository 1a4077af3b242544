//! Measurement and spacepoint data types.

use crate::geometry::Module;
use crate::jagged::Jagged;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A cluster reduced to one local 2-D position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    /// Local position in the module plane.
    pub local: [f64; 2],
    /// Per-axis variance of `local`.
    pub variance: [f64; 2],
    /// Index of the owning module.
    pub module_link: usize,
}

impl Measurement {
    /// Creates a new measurement.
    #[must_use]
    pub fn new(local: [f64; 2], variance: [f64; 2], module_link: usize) -> Self {
        Self {
            local,
            variance,
            module_link,
        }
    }

    /// True if every coordinate and variance is within `epsilon` of `other`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.module_link == other.module_link
            && self
                .local
                .iter()
                .chain(&self.variance)
                .zip(other.local.iter().chain(&other.variance))
                .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

/// Location of a measurement inside a [`MeasurementContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementLink {
    /// Module (entry) index.
    pub module: usize,
    /// Position within the module's measurements.
    pub index: usize,
}

/// A measurement lifted into global coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Spacepoint {
    /// Global position.
    pub global: [f64; 3],
    /// Per-axis variance of `global`.
    pub variance: [f64; 3],
    /// The measurement this point was formed from.
    pub measurement: MeasurementLink,
}

impl Spacepoint {
    /// Global x.
    #[inline]
    #[must_use]
    pub fn x(&self) -> f64 {
        self.global[0]
    }

    /// Global y.
    #[inline]
    #[must_use]
    pub fn y(&self) -> f64 {
        self.global[1]
    }

    /// Global z.
    #[inline]
    #[must_use]
    pub fn z(&self) -> f64 {
        self.global[2]
    }

    /// Transverse radius.
    #[inline]
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.x().hypot(self.y())
    }
}

/// Measurements per module.
pub type MeasurementContainer = Jagged<Module, Measurement>;

/// Spacepoints per module.
pub type SpacepointContainer = Jagged<Module, Spacepoint>;
