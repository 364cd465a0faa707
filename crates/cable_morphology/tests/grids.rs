use cable_core::{PositionIndex, MAX_INTERVALS};
use cable_morphology::{
    FiberMorphology, GridError, MorphologyError, SegmentKind, SpatialGrid, TemporalGrid,
    MIN_POSITIONS,
};

#[test]
fn spatial_grid_includes_both_endpoints() {
    let grid = SpatialGrid::new(3.0, 0.01).expect("grid");
    assert_eq!(grid.len(), 301);
    assert!((grid.length() - 3.0).abs() < 1e-12);
    assert!((grid.position(grid.last_index()) - 3.0).abs() < 1e-12);
    assert_eq!(grid.interior(), 1..=299);
}

#[test]
fn temporal_grid_counts_steps() {
    let grid = TemporalGrid::new(50.0, 0.01).expect("grid");
    assert_eq!(grid.len(), 5000);
    assert!((grid.time(100) - 1.0).abs() < 1e-12);
    assert_eq!(grid.step_at(1.0), 100);
    assert_eq!(grid.step_at(0.0), 0);
    assert_eq!(grid.step_at(1e9), grid.len());
}

#[test]
fn nearest_position_saturates() {
    let grid = SpatialGrid::new(1.0, 0.1).expect("grid");
    assert_eq!(grid.nearest(0.449), PositionIndex(4));
    assert_eq!(grid.nearest(-5.0), PositionIndex(0));
    assert_eq!(grid.nearest(50.0), PositionIndex(10));
}

#[test]
fn degenerate_grids_fail_fast() {
    assert_eq!(
        SpatialGrid::new(1.0, 0.0),
        Err(GridError::InvalidSpatialStep { dx: 0.0 })
    );
    assert_eq!(
        SpatialGrid::new(0.01, 0.01),
        Err(GridError::TooFewPositions {
            count: 2,
            min: MIN_POSITIONS
        })
    );
    assert!(matches!(
        TemporalGrid::new(1.0, -0.1),
        Err(GridError::InvalidTimeStep { .. })
    ));
    assert!(matches!(
        TemporalGrid::new(0.001, 0.01),
        Err(GridError::TooFewSteps { count: 0, .. })
    ));
    assert!(matches!(
        SpatialGrid::new(f64::NAN, 0.1),
        Err(GridError::InvalidLength { .. })
    ));
}

#[test]
fn markers_round_trip_through_segments() {
    let grid = SpatialGrid::with_count(6, 0.1).expect("grid");
    let morphology = FiberMorphology::from_markers(grid, &[0, 1, 1, 0, 0, 0]).expect("markers");
    assert_eq!(morphology.segments[1], SegmentKind::Myelinated);
    assert_eq!(morphology.myelinated_count(), 2);
    assert_eq!(morphology.markers(), vec![0, 1, 1, 0, 0, 0]);
}

#[test]
fn marker_errors_are_reported() {
    let grid = SpatialGrid::with_count(4, 0.1).expect("grid");
    assert_eq!(
        FiberMorphology::from_markers(grid, &[0, 1, 0]),
        Err(MorphologyError::SegmentCountMismatch {
            expected: 4,
            got: 3
        })
    );
    assert_eq!(
        FiberMorphology::from_markers(grid, &[0, 2, 0, 0]),
        Err(MorphologyError::InvalidMarker {
            position: 1,
            value: 2
        })
    );
}

#[test]
fn myelinate_rejects_out_of_range_spans() {
    let grid = SpatialGrid::with_count(10, 0.1).expect("grid");
    let mut morphology = FiberMorphology::bare(grid);
    morphology.myelinate(3..=5).expect("in range");
    assert!(morphology.is_myelinated(4));
    assert!(!morphology.is_myelinated(6));
    assert!(matches!(
        morphology.myelinate(8..=10),
        Err(MorphologyError::SegmentOutOfRange { .. })
    ));
}

#[test]
fn oversized_grids_are_errors() {
    assert!(matches!(
        SpatialGrid::new(1e30, 1e-10),
        Err(GridError::TooManyIntervals { max: MAX_INTERVALS, .. })
    ));
    assert!(matches!(
        TemporalGrid::new(1e30, 1e-10),
        Err(GridError::TooManyIntervals { max: MAX_INTERVALS, .. })
    ));
    assert!(matches!(
        SpatialGrid::new(f64::MAX, 1e-300),
        Err(GridError::TooManyIntervals { .. })
    ));
    assert!(matches!(
        SpatialGrid::with_count(usize::MAX, 0.01),
        Err(GridError::TooManyIntervals { .. })
    ));
    assert!(matches!(
        TemporalGrid::with_count(usize::MAX, 0.01),
        Err(GridError::TooManyIntervals { .. })
    ));
}
