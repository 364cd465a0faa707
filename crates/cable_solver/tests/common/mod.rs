#![allow(dead_code)]

use cable_core::InitialConditions;
use cable_morphology::{FiberMorphology, SpatialGrid, TemporalGrid};
use cable_solver::{CableSolver, CableState, Perturbation, RunOutput, SolverConfig};
use cable_stimulus::{Pulse, PulseProtocol, StimulusSource};

pub const DX_CM: f64 = 0.01;
pub const DT_MS: f64 = 0.01;
pub const LENGTH_CM: f64 = 1.0;

pub fn bare_fiber() -> FiberMorphology {
    FiberMorphology::bare(SpatialGrid::new(LENGTH_CM, DX_CM).expect("spatial grid"))
}

pub fn temporal(duration_ms: f64) -> TemporalGrid {
    TemporalGrid::new(duration_ms, DT_MS).expect("temporal grid")
}

pub fn run_with<S: StimulusSource>(
    config: SolverConfig,
    morphology: FiberMorphology,
    duration_ms: f64,
    stimulus: &S,
) -> (CableSolver, CableState, RunOutput) {
    let mut solver =
        CableSolver::new(config, morphology, temporal(duration_ms)).expect("solver should init");
    let mut state = solver
        .initial_state(InitialConditions::default(), Perturbation::None)
        .expect("initial state");
    let output = solver.run(&mut state, stimulus, 1).expect("run");
    (solver, state, output)
}

/// Brief super-threshold pulse on `first..=last`.
pub fn kick(first: usize, last: usize, start_ms: f64) -> PulseProtocol {
    PulseProtocol::single(Pulse {
        start_ms,
        end_ms: start_ms + 1.0,
        amplitude: 200.0,
        first,
        last,
    })
}
