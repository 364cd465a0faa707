#![forbid(unsafe_code)]

//! Injected current as a function of (time, position).
//!
//! The solver samples a [`StimulusSource`] once per interior position per
//! step, after a single up-front [`StimulusSource::validate`] against the grid.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StimulusError {
    #[error("stimulus matrix is {got_steps}x{got_positions}, grid is {steps}x{positions}")]
    DimensionMismatch {
        steps: usize,
        positions: usize,
        got_steps: usize,
        got_positions: usize,
    },
    #[error("stimulus matrix holds {got} values, expected {expected}")]
    ValueCountMismatch { expected: usize, got: usize },
    #[error("stimulus matrix row {row} has {got} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("pulse {index} targets positions {first}..={last}, grid has {positions}")]
    PulseOutOfRange {
        index: usize,
        first: usize,
        last: usize,
        positions: usize,
    },
    #[error("pulse {index} is malformed: {reason}")]
    InvalidPulse { index: usize, reason: &'static str },
    #[error("non-finite stimulus value at step {step}, position {position}")]
    NonFiniteValue { step: usize, position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub steps: usize,
    pub positions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub step: usize,
    pub position: usize,
    pub t_ms: f64,
    pub x_cm: f64,
}

pub trait StimulusSource {
    /// Injected current (uA/cm^2) at `at`; positive values depolarize.
    fn injected(&self, at: SamplePoint) -> f64;

    fn validate(&self, _dims: GridDims) -> Result<(), StimulusError> {
        Ok(())
    }
}

impl<S: StimulusSource + ?Sized> StimulusSource for &S {
    fn injected(&self, at: SamplePoint) -> f64 {
        (**self).injected(at)
    }

    fn validate(&self, dims: GridDims) -> Result<(), StimulusError> {
        (**self).validate(dims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoStimulus;

impl StimulusSource for NoStimulus {
    fn injected(&self, _at: SamplePoint) -> f64 {
        0.0
    }
}

/// Constant current on positions `first..=last` for `start_ms <= t < end_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub start_ms: f64,
    pub end_ms: f64,
    pub amplitude: f64,
    pub first: usize,
    pub last: usize,
}

impl Pulse {
    pub fn at_position(position: usize, start_ms: f64, end_ms: f64, amplitude: f64) -> Self {
        Self {
            start_ms,
            end_ms,
            amplitude,
            first: position,
            last: position,
        }
    }

    /// Held from `t = 0` for the whole run.
    pub fn sustained(position: usize, amplitude: f64) -> Self {
        Self::at_position(position, 0.0, f64::INFINITY, amplitude)
    }

    pub fn is_active(&self, t_ms: f64) -> bool {
        t_ms >= self.start_ms && t_ms < self.end_ms
    }

    pub fn covers(&self, position: usize) -> bool {
        (self.first..=self.last).contains(&position)
    }
}

/// Sum of closed-form pulses; overlapping pulses add.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PulseProtocol {
    pulses: Vec<Pulse>,
}

impl PulseProtocol {
    pub fn new(pulses: Vec<Pulse>) -> Self {
        Self { pulses }
    }

    pub fn single(pulse: Pulse) -> Self {
        Self::new(vec![pulse])
    }

    pub fn with_pulse(mut self, pulse: Pulse) -> Self {
        self.pulses.push(pulse);
        self
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    pub fn onset_ms(&self) -> Option<f64> {
        self.pulses
            .iter()
            .map(|pulse| pulse.start_ms)
            .min_by(f64::total_cmp)
    }
}

impl StimulusSource for PulseProtocol {
    fn injected(&self, at: SamplePoint) -> f64 {
        self.pulses
            .iter()
            .filter(|pulse| pulse.covers(at.position) && pulse.is_active(at.t_ms))
            .map(|pulse| pulse.amplitude)
            .sum()
    }

    fn validate(&self, dims: GridDims) -> Result<(), StimulusError> {
        for (index, pulse) in self.pulses.iter().enumerate() {
            if !pulse.amplitude.is_finite() {
                return Err(StimulusError::InvalidPulse {
                    index,
                    reason: "amplitude must be finite",
                });
            }
            if !pulse.start_ms.is_finite() || pulse.end_ms.is_nan() {
                return Err(StimulusError::InvalidPulse {
                    index,
                    reason: "start must be finite and end must be a number",
                });
            }
            if pulse.end_ms < pulse.start_ms {
                return Err(StimulusError::InvalidPulse {
                    index,
                    reason: "end precedes start",
                });
            }
            if pulse.first > pulse.last || pulse.last >= dims.positions {
                return Err(StimulusError::PulseOutOfRange {
                    index,
                    first: pulse.first,
                    last: pulse.last,
                    positions: dims.positions,
                });
            }
        }
        Ok(())
    }
}

/// Row-major `steps x positions` current matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixStimulus {
    steps: usize,
    positions: usize,
    values: Vec<f64>,
}

impl MatrixStimulus {
    pub fn new(steps: usize, positions: usize, values: Vec<f64>) -> Result<Self, StimulusError> {
        let expected = steps * positions;
        if values.len() != expected {
            return Err(StimulusError::ValueCountMismatch {
                expected,
                got: values.len(),
            });
        }
        if let Some(offset) = values.iter().position(|value| !value.is_finite()) {
            return Err(StimulusError::NonFiniteValue {
                step: offset / positions.max(1),
                position: offset % positions.max(1),
            });
        }
        Ok(Self {
            steps,
            positions,
            values,
        })
    }

    pub fn zeros(steps: usize, positions: usize) -> Self {
        Self {
            steps,
            positions,
            values: vec![0.0; steps * positions],
        }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, StimulusError> {
        let steps = rows.len();
        let positions = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(steps * positions);
        for (row, entries) in rows.into_iter().enumerate() {
            if entries.len() != positions {
                return Err(StimulusError::RaggedRow {
                    row,
                    expected: positions,
                    got: entries.len(),
                });
            }
            values.extend(entries);
        }
        Self::new(steps, positions, values)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn positions(&self) -> usize {
        self.positions
    }

    pub fn get(&self, step: usize, position: usize) -> Option<f64> {
        if step >= self.steps || position >= self.positions {
            return None;
        }
        self.values.get(step * self.positions + position).copied()
    }

    pub fn set(&mut self, step: usize, position: usize, value: f64) {
        if step < self.steps && position < self.positions {
            self.values[step * self.positions + position] = value;
        }
    }
}

impl StimulusSource for MatrixStimulus {
    fn injected(&self, at: SamplePoint) -> f64 {
        debug_assert!(at.step < self.steps && at.position < self.positions);
        self.get(at.step, at.position).unwrap_or(0.0)
    }

    fn validate(&self, dims: GridDims) -> Result<(), StimulusError> {
        if self.steps != dims.steps || self.positions != dims.positions {
            return Err(StimulusError::DimensionMismatch {
                steps: dims.steps,
                positions: dims.positions,
                got_steps: self.steps,
                got_positions: self.positions,
            });
        }
        Ok(())
    }
}

/// Configuration-selected stimulus.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Stimulus {
    #[default]
    None,
    Protocol(PulseProtocol),
    Matrix(MatrixStimulus),
}

impl StimulusSource for Stimulus {
    fn injected(&self, at: SamplePoint) -> f64 {
        match self {
            Stimulus::None => NoStimulus.injected(at),
            Stimulus::Protocol(protocol) => protocol.injected(at),
            Stimulus::Matrix(matrix) => matrix.injected(at),
        }
    }

    fn validate(&self, dims: GridDims) -> Result<(), StimulusError> {
        match self {
            Stimulus::None => Ok(()),
            Stimulus::Protocol(protocol) => protocol.validate(dims),
            Stimulus::Matrix(matrix) => matrix.validate(dims),
        }
    }
}
