#![forbid(unsafe_code)]

//! Explicit finite-difference solver for the Hodgkin-Huxley cable equation.
//!
//! ```text
//! V[x] += dt / C_m * (D * lap(V)[x] / dx^2 - I_ion[x] + I_stim[t, x])
//! g[x] += dt * (alpha_g(V_old[x]) * (1 - g[x]) - beta_g(V_old[x]) * g[x])
//! ```
//!
//! with `D = radius / (2 * resistance)`, attenuated at myelinated positions.
//! Only interior positions are integrated; both endpoints copy their interior
//! neighbor after every sweep.

mod guard;
mod history;

pub use guard::{GuardStats, StabilityGuard};
pub use history::History;

use cable_channels::{ionic_currents, GatingState};
use cable_core::{is_positive_finite, CableParams, InitialConditions, MembraneParams, StepIndex};
use cable_morphology::{FiberMorphology, MorphologyError, SegmentKind, TemporalGrid};
use cable_stimulus::{GridDims, SamplePoint, StimulusError, StimulusSource};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_MYELIN_ATTENUATION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    pub membrane: MembraneParams,
    pub cable: CableParams,
    pub myelin_attenuation: f64,
    pub guard: StabilityGuard,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            membrane: MembraneParams::default(),
            cable: CableParams::default(),
            myelin_attenuation: DEFAULT_MYELIN_ATTENUATION,
            guard: StabilityGuard::default(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), SolverError> {
        let membrane = &self.membrane;
        check_positive("c_m", membrane.c_m)?;
        for (name, value) in [
            ("g_na", membrane.g_na),
            ("g_k", membrane.g_k),
            ("g_l", membrane.g_l),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SolverError::InvalidParameter { name, value });
            }
        }
        for (name, value) in [
            ("e_na", membrane.e_na),
            ("e_k", membrane.e_k),
            ("e_l", membrane.e_l),
        ] {
            check_finite(name, value)?;
        }
        check_positive("radius", self.cable.radius)?;
        check_positive("resistance", self.cable.resistance)?;
        check_positive("myelin_attenuation", self.myelin_attenuation)?;

        let guard = &self.guard;
        if !(guard.v_min.is_finite() && guard.v_max.is_finite() && guard.v_min < guard.v_max) {
            return Err(SolverError::InvalidGuardBand {
                v_min: guard.v_min,
                v_max: guard.v_max,
            });
        }
        for (name, value) in [
            ("v_fallback", guard.v_fallback),
            ("m_fallback", guard.m_fallback),
            ("h_fallback", guard.h_fallback),
            ("n_fallback", guard.n_fallback),
        ] {
            check_finite(name, value)?;
        }
        if !(0.0..=1.0).contains(&guard.warn_rate) {
            return Err(SolverError::InvalidParameter {
                name: "warn_rate",
                value: guard.warn_rate,
            });
        }
        Ok(())
    }
}

fn check_finite(name: &'static str, value: f64) -> Result<(), SolverError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SolverError::InvalidParameter { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), SolverError> {
    if is_positive_finite(value) {
        Ok(())
    } else {
        Err(SolverError::InvalidParameter { name, value })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error(transparent)]
    Morphology(#[from] MorphologyError),
    #[error(transparent)]
    Stimulus(#[from] StimulusError),
    #[error("parameter {name} has invalid value {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("guard band [{v_min}, {v_max}] is empty or not finite")]
    InvalidGuardBand { v_min: f64, v_max: f64 },
    #[error("state has {got} positions, grid has {expected}")]
    StateSizeMismatch { expected: usize, got: usize },
    #[error("perturbation {first}..={last} exceeds {positions} grid positions")]
    PerturbationOutOfRange {
        first: usize,
        last: usize,
        positions: usize,
    },
    #[error("record stride must be at least 1")]
    InvalidRecordStride,
    #[error("run already started")]
    AlreadyStarted,
    #[error("run completed after {steps} steps")]
    RunCompleted { steps: usize },
}

/// Initial potential displacement applied on top of the broadcast value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Perturbation {
    #[default]
    None,
    Point { position: usize, v: f64 },
    Span { first: usize, last: usize, v: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CableState {
    pub voltages: Vec<f64>,
    pub gates: Vec<GatingState>,
}

impl CableState {
    pub fn uniform(initial: InitialConditions, positions: usize) -> Self {
        let gates = GatingState {
            m: initial.m,
            h: initial.h,
            n: initial.n,
        };
        Self {
            voltages: vec![initial.v; positions],
            gates: vec![gates; positions],
        }
    }

    /// All gates at their steady state for `v`.
    pub fn resting(v: f64, positions: usize) -> Self {
        Self {
            voltages: vec![v; positions],
            gates: vec![GatingState::from_voltage(v); positions],
        }
    }

    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    pub fn perturb(&mut self, perturbation: Perturbation) -> Result<(), SolverError> {
        let (first, last, v) = match perturbation {
            Perturbation::None => return Ok(()),
            Perturbation::Point { position, v } => (position, position, v),
            Perturbation::Span { first, last, v } => (first, last, v),
        };
        if first > last || last >= self.voltages.len() {
            return Err(SolverError::PerturbationOutOfRange {
                first,
                last,
                positions: self.voltages.len(),
            });
        }
        check_finite("perturbation", v)?;
        for voltage in &mut self.voltages[first..=last] {
            *voltage = v;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: StepIndex,
    pub t_ms: f64,
    pub guard_triggers: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub history: History,
    pub guard: GuardStats,
}

#[derive(Debug, Clone)]
pub struct CableSolver {
    config: SolverConfig,
    morphology: FiberMorphology,
    temporal: TemporalGrid,
    coupling: Vec<f64>,
    scratch: Vec<f64>,
    phase: RunPhase,
    step_count: usize,
    stats: GuardStats,
    unstable_reported: bool,
}

impl CableSolver {
    pub fn new(
        config: SolverConfig,
        morphology: FiberMorphology,
        temporal: TemporalGrid,
    ) -> Result<Self, SolverError> {
        config.validate()?;
        morphology.validate()?;

        let dx = morphology.grid.dx();
        let gain = config.cable.diffusion_coefficient() / (dx * dx);
        let coupling = morphology
            .segments
            .iter()
            .map(|segment| match segment {
                SegmentKind::Bare => gain,
                SegmentKind::Myelinated => gain / config.myelin_attenuation,
            })
            .collect();
        let scratch = vec![0.0; morphology.grid.len()];

        Ok(Self {
            config,
            morphology,
            temporal,
            coupling,
            scratch,
            phase: RunPhase::NotStarted,
            step_count: 0,
            stats: GuardStats::default(),
            unstable_reported: false,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn morphology(&self) -> &FiberMorphology {
        &self.morphology
    }

    pub fn temporal(&self) -> TemporalGrid {
        self.temporal
    }

    pub fn dims(&self) -> GridDims {
        GridDims {
            steps: self.temporal.len(),
            positions: self.morphology.grid.len(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn guard_stats(&self) -> GuardStats {
        self.stats
    }

    /// Initial state for this grid, perturbed as requested.
    pub fn initial_state(
        &self,
        initial: InitialConditions,
        perturbation: Perturbation,
    ) -> Result<CableState, SolverError> {
        let mut state = CableState::uniform(initial, self.morphology.grid.len());
        state.perturb(perturbation)?;
        Ok(state)
    }

    /// Advances one step. State and stimulus are checked against the grid on
    /// every call, so the source may change between steps.
    pub fn step<S: StimulusSource + ?Sized>(
        &mut self,
        state: &mut CableState,
        stimulus: &S,
    ) -> Result<StepReport, SolverError> {
        if self.phase == RunPhase::Completed {
            return Err(SolverError::RunCompleted {
                steps: self.step_count,
            });
        }
        self.check_state(state)?;
        stimulus.validate(self.dims())?;
        Ok(self.step_checked(state, stimulus))
    }

    fn step_checked<S: StimulusSource + ?Sized>(
        &mut self,
        state: &mut CableState,
        stimulus: &S,
    ) -> StepReport {
        self.phase = RunPhase::Running;
        let report = self.advance(state, stimulus);
        if self.step_count == self.temporal.len() {
            self.phase = RunPhase::Completed;
        }
        report
    }

    /// Runs every remaining step from a fresh solver, recording one history
    /// row every `record_every` steps (step indices `0, k, 2k, ...`).
    pub fn run<S: StimulusSource + ?Sized>(
        &mut self,
        state: &mut CableState,
        stimulus: &S,
        record_every: usize,
    ) -> Result<RunOutput, SolverError> {
        if self.phase != RunPhase::NotStarted {
            return Err(SolverError::AlreadyStarted);
        }
        if record_every == 0 {
            return Err(SolverError::InvalidRecordStride);
        }
        let dims = self.dims();
        self.check_state(state)?;
        stimulus.validate(dims)?;

        info!(
            positions = dims.positions,
            steps = dims.steps,
            dx = self.morphology.grid.dx(),
            dt = self.temporal.dt(),
            myelinated = self.morphology.myelinated_count(),
            record_every,
            "starting cable run"
        );

        let mut history =
            History::with_capacity(dims.positions, record_every, self.temporal.dt(), dims.steps);
        while self.phase != RunPhase::Completed {
            let report = self.step_checked(state, stimulus);
            if report.step.index() % record_every == 0 {
                history.push(report.step, &state.voltages);
                debug!(
                    step = report.step.0,
                    t_ms = report.t_ms,
                    guard_triggers = report.guard_triggers,
                    "recorded row"
                );
            }
        }

        info!(
            rows = history.len(),
            guard_triggers = self.stats.triggers(),
            trigger_rate = self.stats.trigger_rate(),
            diverged = self.stats.diverged(),
            "cable run completed"
        );
        Ok(RunOutput {
            history,
            guard: self.stats,
        })
    }

    fn check_state(&self, state: &CableState) -> Result<(), SolverError> {
        let expected = self.morphology.grid.len();
        for got in [state.voltages.len(), state.gates.len()] {
            if got != expected {
                return Err(SolverError::StateSizeMismatch { expected, got });
            }
        }
        Ok(())
    }

    fn advance<S: StimulusSource + ?Sized>(
        &mut self,
        state: &mut CableState,
        stimulus: &S,
    ) -> StepReport {
        let step = self.step_count;
        let t_ms = self.temporal.time(step);
        let dt = self.temporal.dt();
        let membrane = self.config.membrane;
        let guard = self.config.guard;
        let grid = self.morphology.grid;
        let last = grid.last_index();
        let voltages = &state.voltages;

        let mut triggers = 0;
        for x in grid.interior() {
            let v = voltages[x];
            let ionic = ionic_currents(&membrane, state.gates[x], v).total();
            let diffusion = self.coupling[x] * (voltages[x + 1] - 2.0 * v + voltages[x - 1]);
            let injected = stimulus.injected(SamplePoint {
                step,
                position: x,
                t_ms,
                x_cm: grid.position(x),
            });
            let updated = v + dt / membrane.c_m * (diffusion - ionic + injected);

            let gates = &mut state.gates[x];
            gates.update(v, dt);
            let (updated, guarded) = guard.stabilize(updated, gates, &mut self.stats);
            triggers += guarded;
            self.scratch[x] = updated;
        }

        self.scratch[0] = self.scratch[1];
        self.scratch[last] = self.scratch[last - 1];
        state.gates[0] = state.gates[1];
        state.gates[last] = state.gates[last - 1];
        std::mem::swap(&mut state.voltages, &mut self.scratch);

        self.stats.steps += 1;
        self.stats.updates += (last - 1) as u64;
        if triggers > 0 {
            self.stats.guarded_steps += 1;
        }
        if !self.unstable_reported && self.stats.exceeds(guard.warn_rate) {
            self.unstable_reported = true;
            warn!(
                step,
                trigger_rate = self.stats.trigger_rate(),
                warn_rate = guard.warn_rate,
                "stability guard triggering above expected rate; step sizes may be unstable"
            );
        }

        self.step_count += 1;
        StepReport {
            step: StepIndex(step as u32),
            t_ms,
            guard_triggers: triggers,
        }
    }

    pub fn config_digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"CABLE:CFG");
        let membrane = &self.config.membrane;
        for value in [
            membrane.c_m,
            membrane.g_na,
            membrane.g_k,
            membrane.g_l,
            membrane.e_na,
            membrane.e_k,
            membrane.e_l,
            self.config.cable.radius,
            self.config.cable.resistance,
            self.config.myelin_attenuation,
            self.morphology.grid.dx(),
            self.temporal.dt(),
        ] {
            update_f64(&mut hasher, value);
        }
        update_u64(&mut hasher, self.morphology.grid.len() as u64);
        update_u64(&mut hasher, self.temporal.len() as u64);
        let guard = &self.config.guard;
        update_u8(&mut hasher, guard.enabled as u8);
        for value in [
            guard.v_min,
            guard.v_max,
            guard.v_fallback,
            guard.m_fallback,
            guard.h_fallback,
            guard.n_fallback,
        ] {
            update_f64(&mut hasher, value);
        }
        for segment in &self.morphology.segments {
            update_u8(&mut hasher, segment_code(*segment));
        }
        *hasher.finalize().as_bytes()
    }

    pub fn snapshot_digest(&self, state: &CableState) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"CABLE:SNAP");
        update_u64(&mut hasher, self.step_count as u64);
        update_u64(&mut hasher, state.voltages.len() as u64);
        for (v, gates) in state.voltages.iter().zip(state.gates.iter()) {
            update_f64(&mut hasher, *v);
            update_f64(&mut hasher, gates.m);
            update_f64(&mut hasher, gates.h);
            update_f64(&mut hasher, gates.n);
        }
        *hasher.finalize().as_bytes()
    }
}

fn segment_code(segment: SegmentKind) -> u8 {
    match segment {
        SegmentKind::Bare => 0,
        SegmentKind::Myelinated => 1,
    }
}

fn update_u8(hasher: &mut blake3::Hasher, value: u8) {
    hasher.update(&[value]);
}

fn update_u64(hasher: &mut blake3::Hasher, value: u64) {
    hasher.update(&value.to_le_bytes());
}

fn update_f64(hasher: &mut blake3::Hasher, value: f64) {
    hasher.update(&value.to_bits().to_le_bytes());
}
