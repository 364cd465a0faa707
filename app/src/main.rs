#![forbid(unsafe_code)]

use std::path::PathBuf;

use cable_solver::{History, RunOutput, SolverError};
use cable_trace::{digest_history, write_csv, CsvOptions, TraceError};
use clap::Parser;
use profiles::{ConfigError, ProfileName, Simulation, SimulationConfig};
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Hodgkin-Huxley cable simulation
#[derive(Parser, Debug)]
#[command(name = "cable-sim")]
#[command(version, about = "Explicit Hodgkin-Huxley cable integrator", long_about = None)]
struct Cli {
    /// YAML config, or a flat parameter file when the extension is .json
    #[arg(short, long, conflicts_with = "profile")]
    config: Option<PathBuf>,

    /// Built-in profile: squid-axon, quiescent or myelinated
    #[arg(short, long)]
    profile: Option<ProfileName>,

    /// Write the stored potential history to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Prefix each CSV row with its step index and time
    #[arg(long)]
    index_columns: bool,

    /// Store one history row every N steps
    #[arg(long)]
    record_every: Option<usize>,

    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation failed: {0}")]
    Solver(#[from] SolverError),
    #[error("export failed: {0}")]
    Trace(#[from] TraceError),
    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn log_level(name: &str) -> Level {
    match name.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn load_config(cli: &Cli) -> Result<SimulationConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => cli.profile.unwrap_or(ProfileName::SquidAxon).config(),
    };
    if let Some(record_every) = cli.record_every {
        config.record_every = record_every;
    }
    Ok(config)
}

fn crossing_summary(history: &History, position: usize) -> String {
    match history.first_crossing(position, 0.0) {
        Some(step) => format!(
            "position {position} first crossed 0 mV at step {} ({:.3} ms)",
            step.0,
            history.end_time(step)
        ),
        None => format!("position {position} never crossed 0 mV"),
    }
}

fn print_summary(simulation: &Simulation, output: &RunOutput) {
    let grid = &simulation.solver.morphology().grid;
    let temporal = simulation.solver.temporal();
    let guard = &output.guard;
    println!(
        "grid: {} positions x {} steps (dx {} cm, dt {} ms)",
        grid.len(),
        temporal.len(),
        grid.dx(),
        temporal.dt()
    );
    println!(
        "history: {} rows, stride {}",
        output.history.len(),
        output.history.stride()
    );
    let far = grid.last_index().saturating_sub(1);
    println!("{}", crossing_summary(&output.history, far));
    println!(
        "guard: {} clamps, {} potential resets, {} gate resets, rate {:.4}{}",
        guard.potential_clamps,
        guard.potential_resets,
        guard.gate_resets,
        guard.trigger_rate(),
        if guard.diverged() { " (diverged)" } else { "" }
    );
    println!("config digest: {}", hex::encode(simulation.solver.config_digest()));
    println!("history digest: {}", hex::encode(digest_history(&output.history)));
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(&cli.log_level))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli)?;
    let mut simulation = config.build()?;
    info!(
        source = ?cli.config.as_deref().map(|p| p.display().to_string()),
        record_every = simulation.record_every,
        "configuration accepted"
    );

    let output = simulation.run()?;
    print_summary(&simulation, &output);

    if let Some(path) = &cli.csv {
        let options = CsvOptions {
            index_columns: cli.index_columns,
            ..CsvOptions::default()
        };
        write_csv(path, &output.history, options)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use profiles::{PulseSection, StimulusSection};

    #[test]
    fn profile_and_config_conflict() {
        let parsed = Cli::try_parse_from([
            "cable-sim",
            "--config",
            "run.yaml",
            "--profile",
            "quiescent",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn record_stride_overrides_profile() {
        let cli = Cli::try_parse_from(["cable-sim", "-p", "myelinated", "--record-every", "25"])
            .expect("cli");
        let config = load_config(&cli).expect("config");
        assert_eq!(config.record_every, 25);
        assert_eq!(config.myelin.spans.len(), 1);
    }

    #[test]
    fn crossing_time_is_reported_at_step_end() {
        let mut config = ProfileName::SquidAxon.config();
        config.grid.length_cm = 0.1;
        config.grid.duration_ms = 3.0;
        config.stimulus = StimulusSection::Protocol {
            pulses: vec![PulseSection {
                start_ms: 0.0,
                end_ms: Some(1.0),
                amplitude: 200.0,
                first: 1,
                last: Some(3),
            }],
        };
        let mut simulation = config.build().expect("build");
        let output = simulation.run().expect("run");

        let step = output.history.first_crossing(1, 0.0).expect("crossing");
        let end = (step.index() + 1) as f64 * 0.01;
        let line = crossing_summary(&output.history, 1);
        assert!(line.contains(&format!("step {} ({end:.3} ms)", step.0)), "{line}");
        assert!(crossing_summary(&output.history, 99).contains("never crossed"));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        assert!(Cli::try_parse_from(["cable-sim", "--profile", "giant"]).is_err());
    }
}
