mod common;

use cable_channels::balanced_leak_reversal;
use cable_core::MembraneParams;
use cable_solver::{CableSolver, CableState, SolverConfig};
use cable_stimulus::NoStimulus;
use common::{bare_fiber, kick, run_with, temporal};

const V_REST: f64 = -65.0;

#[test]
fn balanced_rest_stays_put_without_stimulus() {
    let membrane = MembraneParams {
        e_l: balanced_leak_reversal(&MembraneParams::default(), V_REST).expect("leak"),
        ..MembraneParams::default()
    };
    let config = SolverConfig {
        membrane,
        ..SolverConfig::default()
    };
    let morphology = bare_fiber();
    let positions = morphology.grid.len();
    let mut solver = CableSolver::new(config, morphology, temporal(10.0)).expect("solver");
    let mut state = CableState::resting(V_REST, positions);
    let output = solver.run(&mut state, &NoStimulus, 1).expect("run");

    assert_eq!(output.history.len(), 1000);
    for (_, row) in output.history.rows() {
        for v in row {
            assert!((v - V_REST).abs() < 1e-9, "potential drifted to {v}");
        }
    }
    assert_eq!(output.guard.triggers(), 0);
}

#[test]
fn reference_rest_drifts_only_slightly() {
    let (_, _, output) = run_with(SolverConfig::default(), bare_fiber(), 10.0, &NoStimulus);
    let last = output.history.last_row().expect("rows");
    for v in last {
        assert!((v - V_REST).abs() < 0.05, "potential moved to {v}");
    }
}

#[test]
fn boundaries_mirror_their_neighbors_every_step() {
    let (_, state, output) =
        run_with(SolverConfig::default(), bare_fiber(), 15.0, &kick(1, 3, 0.0));
    let last = output.history.positions() - 1;
    for (step, row) in output.history.rows() {
        assert_eq!(row[0], row[1], "left boundary at step {}", step.0);
        assert_eq!(row[last], row[last - 1], "right boundary at step {}", step.0);
    }
    assert_eq!(state.gates[0], state.gates[1]);
    assert_eq!(state.gates[last], state.gates[last - 1]);
}
