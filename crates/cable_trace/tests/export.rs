use std::io::BufReader;

use cable_core::{InitialConditions, StepIndex};
use cable_morphology::{FiberMorphology, SpatialGrid, TemporalGrid};
use cable_solver::{CableSolver, History, Perturbation, SolverConfig};
use cable_stimulus::{Pulse, PulseProtocol};
use cable_trace::{
    digest_history, frames, read_csv, read_delimited, write_csv, write_delimited, CsvOptions,
    TraceError,
};

fn small_history(record_every: usize) -> History {
    let grid = SpatialGrid::new(0.2, 0.01).expect("grid");
    let temporal = TemporalGrid::new(2.0, 0.01).expect("temporal");
    let mut solver = CableSolver::new(SolverConfig::default(), FiberMorphology::bare(grid), temporal)
        .expect("solver");
    let mut state = solver
        .initial_state(InitialConditions::default(), Perturbation::None)
        .expect("state");
    let protocol = PulseProtocol::single(Pulse::at_position(2, 0.0, 0.5, 50.0));
    solver
        .run(&mut state, &protocol, record_every)
        .expect("run")
        .history
}

#[test]
fn csv_file_preserves_every_value() {
    let history = small_history(1);
    let path = std::env::temp_dir().join(format!("cable_trace_{}.csv", std::process::id()));
    write_csv(&path, &history, CsvOptions::default()).expect("write");
    let table = read_csv(&path, CsvOptions::default()).expect("read");
    let _ = std::fs::remove_file(&path);

    assert_eq!(table.rows.len(), history.len());
    assert!(table.steps.is_empty());
    for (index, row) in table.rows.iter().enumerate() {
        assert_eq!(row.as_slice(), history.row(index).expect("row"));
    }
}

#[test]
fn index_columns_carry_step_and_time() {
    let history = small_history(5);
    let options = CsvOptions {
        delimiter: b';',
        index_columns: true,
    };
    let mut buffer = Vec::new();
    write_delimited(&mut buffer, &history, options).expect("write");
    let text = String::from_utf8(buffer.clone()).expect("utf8");
    assert!(text.lines().all(|line| !line.contains(',')));

    let table = read_delimited(BufReader::new(buffer.as_slice()), options).expect("read");
    assert_eq!(table.steps.len(), 40);
    assert_eq!(table.steps[3], StepIndex(15));
    assert!((table.times[3] - 0.16).abs() < 1e-12);
    assert_eq!(table.rows[0].len(), history.positions());
}

#[test]
fn malformed_tables_are_rejected() {
    let ragged = "1,2,3\n4,5\n";
    let err = read_delimited(BufReader::new(ragged.as_bytes()), CsvOptions::default())
        .expect_err("ragged");
    assert!(matches!(
        err,
        TraceError::ColumnMismatch {
            line: 2,
            expected: 3,
            got: 2
        }
    ));

    let garbage = "1,x\n";
    let err = read_delimited(BufReader::new(garbage.as_bytes()), CsvOptions::default())
        .expect_err("garbage");
    assert!(matches!(err, TraceError::InvalidFormat { line: 1, .. }));
}

#[test]
fn frames_decimate_stored_rows() {
    let history = small_history(1);
    let all = frames(&history, 1).count();
    assert_eq!(all, history.len());

    let sampled = frames(&history, 10).collect::<Vec<_>>();
    assert_eq!(sampled.len(), 20);
    assert_eq!(sampled[1].step, StepIndex(10));
    assert_eq!(sampled[1].values, history.row(10).expect("row"));
    assert!((sampled[1].t_ms - 0.11).abs() < 1e-12);
}

#[test]
fn history_digest_is_stable_and_sensitive() {
    let a = small_history(1);
    let b = small_history(1);
    let decimated = small_history(2);
    assert_eq!(digest_history(&a), digest_history(&b));
    assert_ne!(digest_history(&a), digest_history(&decimated));
}
