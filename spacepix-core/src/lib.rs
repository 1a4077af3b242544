//! spacepix-core: Core data model and traits for cell clusterization.
//!
//! This crate provides the event data model (cells, clusters, measurements,
//! spacepoints), module geometry, and the [`Clusterization`] trait that the
//! sequential and parallel pipelines in `spacepix-algorithms` implement.
//!

pub mod cell;
pub mod cluster;
pub mod clusterization;
pub mod error;
pub mod event;
pub mod geometry;
pub mod jagged;
pub mod measurement;

pub use cell::{Cell, Channel};
pub use cluster::{ClusterContainer, ClusterLayout, ModuleLabels};
pub use clusterization::{Clusterization, ClusterizationConfig, EventOutput, EventStatistics};
pub use error::{ClusterizationError, Error, Result};
pub use event::{CellContainer, EventBuilder};
pub use geometry::{
    DetectorGeometry, DigitizationConfig, Module, ModuleDigitization, PixelSegmentation,
    Transform3,
};
pub use jagged::{FlatIndex, Jagged};
pub use measurement::{
    Measurement, MeasurementContainer, MeasurementLink, Spacepoint, SpacepointContainer,
};
