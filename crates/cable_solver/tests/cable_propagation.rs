mod common;

use cable_solver::{RunOutput, SolverConfig};
use common::{bare_fiber, kick, run_with};

const THRESHOLD_MV: f64 = 0.0;
const DURATION_MS: f64 = 15.0;

fn crossing(output: &RunOutput, position: usize) -> usize {
    output
        .history
        .first_crossing(position, THRESHOLD_MV)
        .unwrap_or_else(|| panic!("position {position} never crossed {THRESHOLD_MV} mV"))
        .index()
}

fn variance(values: &[f64]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

#[test]
fn excitation_spreads_outward_from_the_stimulus() {
    let onset_step = 200;
    let (_, _, output) =
        run_with(SolverConfig::default(), bare_fiber(), DURATION_MS, &kick(49, 51, 2.0));

    let center = crossing(&output, 50);
    assert!(center >= onset_step, "crossed at {center} before onset");
    for (_, row) in output.history.rows().take(onset_step) {
        assert!(row.iter().all(|v| *v < THRESHOLD_MV));
    }

    for side in [-1i64, 1] {
        let mut previous = center;
        for distance in [5i64, 10, 20, 30, 40] {
            let position = (50 + side * distance) as usize;
            let arrival = crossing(&output, position);
            assert!(
                arrival > previous,
                "position {position} crossed at {arrival}, not after {previous}"
            );
            previous = arrival;
        }
    }
}

#[test]
fn conduction_delay_scales_with_distance() {
    let (_, _, output) =
        run_with(SolverConfig::default(), bare_fiber(), DURATION_MS, &kick(1, 3, 0.0));
    let origin = crossing(&output, 10);
    let near = crossing(&output, 30) - origin;
    let far = crossing(&output, 50) - origin;
    let farther = crossing(&output, 70) - origin;

    assert!(near > 0 && far > near && farther > far);
    let ratio = far as f64 / near as f64;
    assert!((1.8..=2.2).contains(&ratio), "delay ratio {ratio}");
    let ratio = farther as f64 / near as f64;
    assert!((2.7..=3.3).contains(&ratio), "delay ratio {ratio}");
}

#[test]
fn identical_runs_are_bit_identical() {
    let (solver_a, state_a, output_a) =
        run_with(SolverConfig::default(), bare_fiber(), 5.0, &kick(1, 3, 0.0));
    let (solver_b, state_b, output_b) =
        run_with(SolverConfig::default(), bare_fiber(), 5.0, &kick(1, 3, 0.0));

    assert_eq!(output_a.history, output_b.history);
    assert_eq!(output_a.guard, output_b.guard);
    assert_eq!(solver_a.config_digest(), solver_b.config_digest());
    assert_eq!(
        solver_a.snapshot_digest(&state_a),
        solver_b.snapshot_digest(&state_b)
    );
}

#[test]
fn myelinated_span_flattens_the_profile() {
    let span = 40..=60;
    let (_, _, control) =
        run_with(SolverConfig::default(), bare_fiber(), DURATION_MS, &kick(1, 3, 0.0));
    let mut morphology = bare_fiber();
    morphology.myelinate(span.clone()).expect("span");
    let (solver, _, myelinated) =
        run_with(SolverConfig::default(), morphology, DURATION_MS, &kick(1, 3, 0.0));
    assert_eq!(solver.morphology().myelinated_count(), 21);

    let probe = crossing(&control, 50);
    let control_row = control.history.row(probe).expect("control row");
    let myelinated_row = myelinated.history.row(probe).expect("myelinated row");
    let control_var = variance(&control_row[span.clone()]);
    let myelinated_var = variance(&myelinated_row[span]);
    assert!(
        myelinated_var < control_var,
        "myelinated variance {myelinated_var} not below control {control_var}"
    );
}

#[test]
fn myelination_changes_the_config_digest() {
    let (bare, _, _) = run_with(SolverConfig::default(), bare_fiber(), 0.1, &kick(1, 3, 0.0));
    let mut morphology = bare_fiber();
    morphology.myelinate(10..=20).expect("span");
    let (myelinated, _, _) = run_with(SolverConfig::default(), morphology, 0.1, &kick(1, 3, 0.0));
    assert_ne!(bare.config_digest(), myelinated.config_digest());
}
