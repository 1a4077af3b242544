//! High-level helpers that pick an execution model and run whole events.

use spacepix_core::error::Result;
use spacepix_core::{
    CellContainer, Clusterization, ClusterizationConfig, EventOutput, EventStatistics,
    SpacepointContainer,
};

use crate::{ParallelClusterization, SequentialClusterization};

/// Available execution models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionModel {
    /// Single-threaded reference pipeline.
    Sequential,
    /// Launch-based data-parallel pipeline.
    Parallel,
}

impl ExecutionModel {
    /// Every model, in a fixed order.
    pub const ALL: [Self; 2] = [Self::Sequential, Self::Parallel];

    /// Display name, identical to [`Clusterization::name`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "Sequential",
            Self::Parallel => "Parallel",
        }
    }

    /// Builds the pipeline for this model.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid or a dedicated thread pool
    /// cannot be built.
    pub fn build(self, config: &ClusterizationConfig) -> Result<Box<dyn Clusterization>> {
        config.validate()?;
        Ok(match self {
            Self::Sequential => Box::new(SequentialClusterization::with_config(config.clone())),
            Self::Parallel => Box::new(ParallelClusterization::with_config(config.clone())?),
        })
    }
}

impl std::fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs every stage on one event with the given model.
///
/// # Errors
/// Returns an error if the pipeline cannot be built or any stage fails.
pub fn cluster_event(
    cells: &CellContainer,
    model: ExecutionModel,
    config: &ClusterizationConfig,
) -> Result<EventOutput> {
    let algo = model.build(config)?;
    Ok(algo.run(cells)?)
}

/// Runs a sequence of independent events through one pipeline instance.
///
/// Events share no state; only the statistics are accumulated.
///
/// # Errors
/// Stops at the first failing event.
pub fn cluster_events<I>(
    events: I,
    model: ExecutionModel,
    config: &ClusterizationConfig,
) -> Result<(Vec<SpacepointContainer>, EventStatistics)>
where
    I: IntoIterator<Item = CellContainer>,
{
    let algo = model.build(config)?;
    let mut spacepoints = Vec::new();
    let mut statistics = EventStatistics::default();

    for (event, cells) in events.into_iter().enumerate() {
        let output = algo.run(&cells)?;
        let event_stats = output.statistics();
        log::debug!(
            "Event {event}: {} clusters, {} spacepoints",
            event_stats.clusters,
            event_stats.spacepoints
        );
        statistics += event_stats;
        spacepoints.push(output.spacepoints);
    }
    Ok((spacepoints, statistics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacepix_core::{Cell, Module};

    fn event(offset: u32) -> CellContainer {
        let mut cells = CellContainer::new();
        cells.push(
            Module::new(7),
            vec![
                Cell::new(offset, 0, 1.0),
                Cell::new(offset + 1, 0, 1.0),
                Cell::new(offset + 10, 3, 1.0),
            ],
        );
        cells
    }

    #[test]
    fn test_build_names() {
        let config = ClusterizationConfig::default();
        for model in ExecutionModel::ALL {
            let algo = model.build(&config).unwrap();
            assert_eq!(algo.name(), model.name());
            assert_eq!(model.to_string(), model.name());
        }
    }

    #[test]
    fn test_cluster_event() {
        let config = ClusterizationConfig::default();
        for model in ExecutionModel::ALL {
            let output = cluster_event(&event(0), model, &config).unwrap();
            assert_eq!(output.statistics().clusters, 2);
            assert_eq!(output.statistics().cells, 3);
        }
    }

    #[test]
    fn test_cluster_events_accumulates() {
        let config = ClusterizationConfig::default();
        let events = vec![event(0), event(100), CellContainer::new()];
        let (spacepoints, stats) =
            cluster_events(events, ExecutionModel::Parallel, &config).unwrap();

        assert_eq!(spacepoints.len(), 3);
        assert_eq!(stats.clusters, 4);
        assert_eq!(stats.spacepoints, 4);
        assert_eq!(stats.modules, 2);
        assert!(spacepoints[2].is_empty());
    }

    #[test]
    fn test_invalid_config() {
        let config = ClusterizationConfig::new().with_block_size(0);
        assert!(ExecutionModel::Sequential.build(&config).is_err());
        assert!(cluster_event(&event(0), ExecutionModel::Parallel, &config).is_err());
    }
}
