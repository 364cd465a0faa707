#![forbid(unsafe_code)]

use std::ops::RangeInclusive;

use cable_core::{interval_count, is_positive_finite, PositionIndex, MAX_INTERVALS};
use thiserror::Error;

/// The interior difference stencil needs one position on each side.
pub const MIN_POSITIONS: usize = 3;
pub const MIN_STEPS: usize = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("spatial step must be positive and finite, got {dx}")]
    InvalidSpatialStep { dx: f64 },
    #[error("time step must be positive and finite, got {dt}")]
    InvalidTimeStep { dt: f64 },
    #[error("fiber length must be finite and non-negative, got {length}")]
    InvalidLength { length: f64 },
    #[error("duration must be finite and non-negative, got {duration}")]
    InvalidDuration { duration: f64 },
    #[error("grid has {count} positions, need at least {min}")]
    TooFewPositions { count: usize, min: usize },
    #[error("grid has {count} steps, need at least {min}")]
    TooFewSteps { count: usize, min: usize },
    #[error("grid needs {intervals} intervals, at most {max} are supported")]
    TooManyIntervals { intervals: f64, max: usize },
}

fn too_many(intervals: f64) -> GridError {
    GridError::TooManyIntervals {
        intervals,
        max: MAX_INTERVALS,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MorphologyError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("segment marker count {got} does not match {expected} grid positions")]
    SegmentCountMismatch { expected: usize, got: usize },
    #[error("segment range {first}..={last} exceeds {count} grid positions")]
    SegmentOutOfRange {
        first: usize,
        last: usize,
        count: usize,
    },
    #[error("invalid segment marker {value} at position {position}, expected 0 or 1")]
    InvalidMarker { position: usize, value: i64 },
}

/// Inclusive-endpoint spatial grid: `count = floor(length / dx) + 1` positions
/// at `x_i = i * dx`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialGrid {
    dx: f64,
    count: usize,
}

impl SpatialGrid {
    pub fn new(length: f64, dx: f64) -> Result<Self, GridError> {
        if !is_positive_finite(dx) {
            return Err(GridError::InvalidSpatialStep { dx });
        }
        if !length.is_finite() || length < 0.0 {
            return Err(GridError::InvalidLength { length });
        }
        let intervals = interval_count(length, dx).ok_or_else(|| too_many(length / dx))?;
        Self::with_count(intervals + 1, dx)
    }

    pub fn with_count(count: usize, dx: f64) -> Result<Self, GridError> {
        if !is_positive_finite(dx) {
            return Err(GridError::InvalidSpatialStep { dx });
        }
        if count < MIN_POSITIONS {
            return Err(GridError::TooFewPositions {
                count,
                min: MIN_POSITIONS,
            });
        }
        if count - 1 > MAX_INTERVALS {
            return Err(too_many((count - 1) as f64));
        }
        Ok(Self { dx, count })
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn length(&self) -> f64 {
        (self.count - 1) as f64 * self.dx
    }

    pub fn position(&self, index: usize) -> f64 {
        index as f64 * self.dx
    }

    pub fn last_index(&self) -> usize {
        self.count - 1
    }

    pub fn interior(&self) -> RangeInclusive<usize> {
        1..=self.count - 2
    }

    /// Grid index closest to `x`, saturating at the endpoints.
    pub fn nearest(&self, x: f64) -> PositionIndex {
        let raw = (x / self.dx).round();
        let clamped = raw.clamp(0.0, self.last_index() as f64);
        PositionIndex(clamped as u32)
    }
}

/// `count = floor(duration / dt)` steps; step `k` starts at `t_k = k * dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalGrid {
    dt: f64,
    count: usize,
}

impl TemporalGrid {
    pub fn new(duration: f64, dt: f64) -> Result<Self, GridError> {
        if !is_positive_finite(dt) {
            return Err(GridError::InvalidTimeStep { dt });
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(GridError::InvalidDuration { duration });
        }
        let steps = interval_count(duration, dt).ok_or_else(|| too_many(duration / dt))?;
        Self::with_count(steps, dt)
    }

    pub fn with_count(count: usize, dt: f64) -> Result<Self, GridError> {
        if !is_positive_finite(dt) {
            return Err(GridError::InvalidTimeStep { dt });
        }
        if count < MIN_STEPS {
            return Err(GridError::TooFewSteps {
                count,
                min: MIN_STEPS,
            });
        }
        if count > MAX_INTERVALS {
            return Err(too_many(count as f64));
        }
        Ok(Self { dt, count })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn duration(&self) -> f64 {
        self.count as f64 * self.dt
    }

    pub fn time(&self, step: usize) -> f64 {
        step as f64 * self.dt
    }

    /// First step whose start time is at or after `t_ms`.
    pub fn step_at(&self, t_ms: f64) -> usize {
        let raw = (t_ms / self.dt - 1e-9).ceil().max(0.0);
        (raw as usize).min(self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentKind {
    #[default]
    Bare,
    Myelinated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiberMorphology {
    pub grid: SpatialGrid,
    pub segments: Vec<SegmentKind>,
}

impl FiberMorphology {
    pub fn bare(grid: SpatialGrid) -> Self {
        Self {
            grid,
            segments: vec![SegmentKind::Bare; grid.len()],
        }
    }

    pub fn from_segments(
        grid: SpatialGrid,
        segments: Vec<SegmentKind>,
    ) -> Result<Self, MorphologyError> {
        let morphology = Self { grid, segments };
        morphology.validate()?;
        Ok(morphology)
    }

    /// Accepts the `0`/`1` marker array of external configuration files.
    pub fn from_markers(grid: SpatialGrid, markers: &[i64]) -> Result<Self, MorphologyError> {
        let segments = markers
            .iter()
            .enumerate()
            .map(|(position, &value)| match value {
                0 => Ok(SegmentKind::Bare),
                1 => Ok(SegmentKind::Myelinated),
                _ => Err(MorphologyError::InvalidMarker { position, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_segments(grid, segments)
    }

    pub fn validate(&self) -> Result<(), MorphologyError> {
        if self.segments.len() != self.grid.len() {
            return Err(MorphologyError::SegmentCountMismatch {
                expected: self.grid.len(),
                got: self.segments.len(),
            });
        }
        Ok(())
    }

    pub fn myelinate(&mut self, range: RangeInclusive<usize>) -> Result<(), MorphologyError> {
        let (first, last) = (*range.start(), *range.end());
        if first > last || last >= self.segments.len() {
            return Err(MorphologyError::SegmentOutOfRange {
                first,
                last,
                count: self.segments.len(),
            });
        }
        for segment in &mut self.segments[range] {
            *segment = SegmentKind::Myelinated;
        }
        Ok(())
    }

    pub fn is_myelinated(&self, index: usize) -> bool {
        self.segments.get(index) == Some(&SegmentKind::Myelinated)
    }

    pub fn myelinated_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| **segment == SegmentKind::Myelinated)
            .count()
    }

    pub fn markers(&self) -> Vec<i64> {
        self.segments
            .iter()
            .map(|segment| match segment {
                SegmentKind::Bare => 0,
                SegmentKind::Myelinated => 1,
            })
            .collect()
    }
}
