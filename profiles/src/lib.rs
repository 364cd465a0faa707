#![forbid(unsafe_code)]

pub mod config;
pub mod legacy;

use std::fmt;
use std::str::FromStr;

use cable_channels::{balanced_leak_reversal, GatingState};
use cable_core::V_REST_MV;
use cable_solver::{CableSolver, CableState, RunOutput, SolverError};
use cable_stimulus::Stimulus;
use serde::{de, Deserialize, Serialize};

pub use config::*;
pub use legacy::{LegacyParams, LEGACY_CENTRE_KICK_MV};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileName {
    SquidAxon,
    Quiescent,
    Myelinated,
}

impl<'de> Deserialize<'de> for ProfileName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let value: String = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}

impl FromStr for ProfileName {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "squid-axon" | "squid" | "default" => Ok(ProfileName::SquidAxon),
            "quiescent" | "rest" => Ok(ProfileName::Quiescent),
            "myelinated" => Ok(ProfileName::Myelinated),
            _ => Err(ConfigError::UnknownProfile {
                name: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProfileName {
    pub const ALL: [ProfileName; 3] = [
        ProfileName::SquidAxon,
        ProfileName::Quiescent,
        ProfileName::Myelinated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::SquidAxon => "squid-axon",
            ProfileName::Quiescent => "quiescent",
            ProfileName::Myelinated => "myelinated",
        }
    }

    pub fn config(&self) -> SimulationConfig {
        match self {
            ProfileName::SquidAxon => SimulationConfig::default(),
            ProfileName::Quiescent => quiescent(),
            ProfileName::Myelinated => myelinated(),
        }
    }
}

/// Default membrane with the leak reversal balanced at rest, gates at their
/// resting steady states and no injected current.
fn quiescent() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    let membrane = config.membrane.params();
    if let Some(e_l) = balanced_leak_reversal(&membrane, V_REST_MV) {
        config.membrane.e_l = e_l;
    }
    let gates = GatingState::from_voltage(V_REST_MV);
    config.initial = InitialSection {
        v: V_REST_MV,
        m: gates.m,
        h: gates.h,
        n: gates.n,
        perturbation: None,
    };
    config.grid.duration_ms = 20.0;
    config.stimulus = StimulusSection::None;
    config
}

/// Default run with the middle third of the fiber myelinated.
fn myelinated() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    let positions = config
        .spatial_grid()
        .map(|grid| grid.len())
        .unwrap_or_default();
    config.myelin.spans.push(SpanSection {
        first: positions / 3,
        last: 2 * positions / 3,
    });
    config
}

/// Validated run inputs: solver, initial state, stimulus and record stride.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub solver: CableSolver,
    pub state: CableState,
    pub stimulus: Stimulus,
    pub record_every: usize,
}

impl Simulation {
    pub fn run(&mut self) -> Result<RunOutput, SolverError> {
        self.solver
            .run(&mut self.state, &self.stimulus, self.record_every)
    }
}
