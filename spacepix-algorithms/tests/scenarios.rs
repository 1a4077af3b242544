use approx::assert_abs_diff_eq;
use spacepix_algorithms::{
    canonical_clusters, cluster_event, Clusterization, ClusterizationConfig, EventOutput,
    EventStatistics, ExecutionModel, ParallelClusterization, SequentialClusterization,
};
use spacepix_core::{
    Cell, CellContainer, DetectorGeometry, DigitizationConfig, EventBuilder, Module,
    ModuleDigitization, PixelSegmentation, Transform3,
};

fn single_module(cells: Vec<Cell>) -> CellContainer {
    let mut container = CellContainer::new();
    container.push(Module::new(1), cells);
    container
}

fn run_all(cells: &CellContainer) -> Vec<EventOutput> {
    let config = ClusterizationConfig::default();
    ExecutionModel::ALL
        .iter()
        .map(|&model| cluster_event(cells, model, &config).unwrap())
        .collect()
}

#[test]
fn test_two_clusters() {
    let cells = single_module(vec![
        Cell::new(0, 0, 1.0),
        Cell::new(0, 1, 1.0),
        Cell::new(5, 5, 1.0),
    ]);

    for output in run_all(&cells) {
        let mut sizes = output.cluster_sizes.clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);

        let measurements = output.measurements.get(0).unwrap();
        assert_eq!(measurements.len(), 2);
        // Midpoint of channel1 = 0 and 1.
        assert_abs_diff_eq!(measurements[0].local[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(measurements[0].local[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(measurements[1].local[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(measurements[1].local[1], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(measurements[1].variance[0], 1.0 / 12.0, epsilon = 1e-12);
    }
}

#[test]
fn test_diagonal_cells_share_cluster() {
    let cells = single_module(vec![Cell::new(0, 0, 1.0), Cell::new(1, 1, 1.0)]);
    for output in run_all(&cells) {
        assert_eq!(output.clusters.len(), 1);
        assert_eq!(output.labels[0].labels, vec![1, 1]);
    }
}

#[test]
fn test_gap_never_merges() {
    let cells = single_module(vec![
        Cell::new(0, 0, 1.0),
        Cell::new(2, 0, 1.0),
        Cell::new(0, 2, 1.0),
        Cell::new(2, 2, 1.0),
    ]);
    for output in run_all(&cells) {
        assert_eq!(output.clusters.len(), 4);
        assert_eq!(output.labels[0].labels, vec![1, 2, 3, 4]);
    }
}

#[test]
fn test_empty_modules() {
    let mut cells = CellContainer::new();
    cells.push(Module::new(1), Vec::new());
    cells.push(Module::new(2), vec![Cell::new(3, 3, 1.0).with_module(1)]);
    cells.push(Module::new(3), Vec::new());

    for output in run_all(&cells) {
        assert_eq!(output.layout.counts(), &[0, 1, 0]);
        assert_eq!(output.measurements.sizes(), vec![0, 1, 0]);
        assert_eq!(output.spacepoints.sizes(), vec![0, 1, 0]);
    }
}

#[test]
fn test_empty_event() {
    for output in run_all(&CellContainer::new()) {
        assert_eq!(output.statistics(), EventStatistics::default());
        assert!(output.clusters.is_empty());
    }
}

#[test]
fn test_runs_are_idempotent() {
    let cells = single_module(vec![
        Cell::new(0, 0, 3.0),
        Cell::new(1, 0, 1.0),
        Cell::new(9, 0, 2.0),
        Cell::new(0, 1, 4.0),
        Cell::new(9, 1, 2.0),
        Cell::new(4, 7, 8.0),
    ]);

    let sequential = SequentialClusterization::new();
    let first = sequential.run(&cells).unwrap();
    let second = sequential.run(&cells).unwrap();
    assert_eq!(first.clusters, second.clusters);
    assert_eq!(first.measurements, second.measurements);

    let parallel = ParallelClusterization::new();
    let first = parallel.run(&cells).unwrap();
    let second = parallel.run(&cells).unwrap();
    assert_eq!(
        canonical_clusters(&first.clusters),
        canonical_clusters(&second.clusters)
    );
    for (a, b) in first
        .measurements
        .get(0)
        .unwrap()
        .iter()
        .zip(second.measurements.get(0).unwrap())
    {
        assert!(a.approx_eq(b, 1e-12));
    }
}

#[test]
fn test_threshold_and_placement_through_event_builder() {
    let mut geometry = DetectorGeometry::new();
    geometry
        .insert(
            0xa0,
            Transform3::rotation_z(std::f64::consts::FRAC_PI_2, [0.0, 0.0, 100.0]),
        )
        .unwrap();
    let mut digitization = DigitizationConfig::new();
    digitization
        .insert(
            0xa0,
            ModuleDigitization {
                segmentation: PixelSegmentation::with_pitch(0.1, 0.1),
                threshold: 2.0,
            },
        )
        .unwrap();

    let mut builder = EventBuilder::new(&geometry, &digitization);
    builder
        .add_module(
            0xa0,
            vec![
                Cell::new(10, 0, 1.0),
                Cell::new(11, 0, 6.0),
                Cell::new(12, 0, 2.0),
            ],
        )
        .unwrap();
    let cells = builder.build();

    for output in run_all(&cells) {
        let m = output.measurements.get(0).unwrap()[0];
        // Only the middle cell clears the threshold.
        assert_abs_diff_eq!(m.local[0], 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(m.local[1], 0.0, epsilon = 1e-12);

        // A quarter turn maps local x onto global y.
        let sp = output.spacepoints.get(0).unwrap()[0];
        assert_abs_diff_eq!(sp.x(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.y(), 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.z(), 100.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sp.variance[1], m.variance[0], epsilon = 1e-12);
        assert_abs_diff_eq!(sp.variance[0], m.variance[1], epsilon = 1e-12);
    }
}
