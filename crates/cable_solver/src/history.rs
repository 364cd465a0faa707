use cable_core::StepIndex;

/// Append-only potential history, one row of `positions` values per recorded
/// step.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    positions: usize,
    stride: usize,
    dt_ms: f64,
    steps: Vec<StepIndex>,
    values: Vec<f64>,
}

impl History {
    pub fn new(positions: usize, stride: usize, dt_ms: f64) -> Self {
        Self {
            positions,
            stride: stride.max(1),
            dt_ms,
            steps: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Reserves room for a run of `steps` steps. The reservation is a hint:
    /// sizes that overflow or cannot be allocated up front start empty.
    pub fn with_capacity(positions: usize, stride: usize, dt_ms: f64, steps: usize) -> Self {
        let mut history = Self::new(positions, stride, dt_ms);
        let rows = steps.div_ceil(history.stride);
        if let Some(values) = rows.checked_mul(positions) {
            if history.values.try_reserve_exact(values).is_ok() {
                let _ = history.steps.try_reserve_exact(rows);
            }
        }
        history
    }

    pub(crate) fn push(&mut self, step: StepIndex, row: &[f64]) {
        debug_assert_eq!(row.len(), self.positions);
        debug_assert!(self.steps.last().map_or(true, |last| *last < step));
        self.steps.push(step);
        self.values.extend_from_slice(row);
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn dt_ms(&self) -> f64 {
        self.dt_ms
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.steps.len() {
            return None;
        }
        let start = index * self.positions;
        self.values.get(start..start + self.positions)
    }

    pub fn last_row(&self) -> Option<&[f64]> {
        self.len().checked_sub(1).and_then(|index| self.row(index))
    }

    pub fn step_of(&self, index: usize) -> Option<StepIndex> {
        self.steps.get(index).copied()
    }

    /// Time at the end of the recorded step.
    pub fn time_of(&self, index: usize) -> Option<f64> {
        self.step_of(index).map(|step| self.end_time(step))
    }

    pub fn end_time(&self, step: StepIndex) -> f64 {
        (step.index() + 1) as f64 * self.dt_ms
    }

    pub fn rows(&self) -> impl Iterator<Item = (StepIndex, &[f64])> + '_ {
        self.steps
            .iter()
            .copied()
            .zip(self.values.chunks_exact(self.positions.max(1)))
    }

    pub fn column(&self, position: usize) -> Vec<f64> {
        if position >= self.positions {
            return Vec::new();
        }
        self.rows().map(|(_, row)| row[position]).collect()
    }

    /// First recorded row at which `position` reaches `threshold`.
    pub fn first_crossing(&self, position: usize, threshold: f64) -> Option<StepIndex> {
        if position >= self.positions {
            return None;
        }
        self.rows()
            .find(|(_, row)| row[position] >= threshold)
            .map(|(step, _)| step)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
