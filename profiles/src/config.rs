#![forbid(unsafe_code)]

use cable_core::{CableParams, InitialConditions, MembraneParams};
use cable_morphology::{FiberMorphology, GridError, MorphologyError, SpatialGrid, TemporalGrid};
use cable_solver::{
    CableSolver, Perturbation, SolverConfig, SolverError, StabilityGuard,
    DEFAULT_MYELIN_ATTENUATION,
};
use cable_stimulus::{
    MatrixStimulus, Pulse, PulseProtocol, Stimulus, StimulusError, StimulusSource,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::legacy::LegacyParams;
use crate::Simulation;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown profile {name:?}")]
    UnknownProfile { name: String },
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Morphology(#[from] MorphologyError),
    #[error(transparent)]
    Stimulus(#[from] StimulusError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MembraneSection {
    pub c_m: f64,
    pub g_na: f64,
    pub g_k: f64,
    pub g_l: f64,
    pub e_na: f64,
    pub e_k: f64,
    pub e_l: f64,
}

impl Default for MembraneSection {
    fn default() -> Self {
        MembraneSection::from(MembraneParams::default())
    }
}

impl From<MembraneParams> for MembraneSection {
    fn from(params: MembraneParams) -> Self {
        Self {
            c_m: params.c_m,
            g_na: params.g_na,
            g_k: params.g_k,
            g_l: params.g_l,
            e_na: params.e_na,
            e_k: params.e_k,
            e_l: params.e_l,
        }
    }
}

impl MembraneSection {
    pub fn params(&self) -> MembraneParams {
        MembraneParams {
            c_m: self.c_m,
            g_na: self.g_na,
            g_k: self.g_k,
            g_l: self.g_l,
            e_na: self.e_na,
            e_k: self.e_k,
            e_l: self.e_l,
        }
    }
}

/// Fiber radius `a` and axial resistivity `R`, plus the coupling divisor for
/// myelinated positions.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CableSection {
    pub radius: f64,
    pub resistance: f64,
    pub myelin_attenuation: f64,
}

impl Default for CableSection {
    fn default() -> Self {
        let cable = CableParams::default();
        Self {
            radius: cable.radius,
            resistance: cable.resistance,
            myelin_attenuation: DEFAULT_MYELIN_ATTENUATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GridSection {
    pub length_cm: f64,
    pub dx_cm: f64,
    pub duration_ms: f64,
    pub dt_ms: f64,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            length_cm: 3.0,
            dx_cm: 0.01,
            duration_ms: 50.0,
            dt_ms: 0.01,
        }
    }
}

/// Potential override at `first..=last` (a single position when `last` is
/// absent).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PerturbationSection {
    pub first: usize,
    #[serde(default)]
    pub last: Option<usize>,
    pub v: f64,
}

impl PerturbationSection {
    pub fn perturbation(&self) -> Perturbation {
        match self.last {
            None => Perturbation::Point {
                position: self.first,
                v: self.v,
            },
            Some(last) => Perturbation::Span {
                first: self.first,
                last,
                v: self.v,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct InitialSection {
    pub v: f64,
    pub m: f64,
    pub h: f64,
    pub n: f64,
    pub perturbation: Option<PerturbationSection>,
}

impl Default for InitialSection {
    fn default() -> Self {
        let initial = InitialConditions::default();
        Self {
            v: initial.v,
            m: initial.m,
            h: initial.h,
            n: initial.n,
            perturbation: None,
        }
    }
}

impl InitialSection {
    pub fn conditions(&self) -> InitialConditions {
        InitialConditions {
            v: self.v,
            m: self.m,
            h: self.h,
            n: self.n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GuardSection {
    pub enabled: bool,
    pub v_min: f64,
    pub v_max: f64,
    pub v_fallback: f64,
    pub m_fallback: f64,
    pub h_fallback: f64,
    pub n_fallback: f64,
    pub warn_rate: f64,
}

impl Default for GuardSection {
    fn default() -> Self {
        let guard = StabilityGuard::default();
        Self {
            enabled: guard.enabled,
            v_min: guard.v_min,
            v_max: guard.v_max,
            v_fallback: guard.v_fallback,
            m_fallback: guard.m_fallback,
            h_fallback: guard.h_fallback,
            n_fallback: guard.n_fallback,
            warn_rate: guard.warn_rate,
        }
    }
}

impl GuardSection {
    pub fn guard(&self) -> StabilityGuard {
        StabilityGuard {
            enabled: self.enabled,
            v_min: self.v_min,
            v_max: self.v_max,
            v_fallback: self.v_fallback,
            m_fallback: self.m_fallback,
            h_fallback: self.h_fallback,
            n_fallback: self.n_fallback,
            warn_rate: self.warn_rate,
        }
    }
}

/// One rectangular pulse; a missing `end_ms` holds it for the whole run and a
/// missing `last` targets a single position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PulseSection {
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default)]
    pub end_ms: Option<f64>,
    pub amplitude: f64,
    pub first: usize,
    #[serde(default)]
    pub last: Option<usize>,
}

impl PulseSection {
    pub fn pulse(&self) -> Pulse {
        Pulse {
            start_ms: self.start_ms,
            end_ms: self.end_ms.unwrap_or(f64::INFINITY),
            amplitude: self.amplitude,
            first: self.first,
            last: self.last.unwrap_or(self.first),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StimulusSection {
    None,
    Protocol { pulses: Vec<PulseSection> },
    Matrix { rows: Vec<Vec<f64>> },
}

impl Default for StimulusSection {
    fn default() -> Self {
        StimulusSection::Protocol {
            pulses: vec![PulseSection {
                start_ms: 0.0,
                end_ms: None,
                amplitude: 20.0,
                first: 1,
                last: None,
            }],
        }
    }
}

impl StimulusSection {
    pub fn stimulus(&self) -> Result<Stimulus, StimulusError> {
        Ok(match self {
            StimulusSection::None => Stimulus::None,
            StimulusSection::Protocol { pulses } => Stimulus::Protocol(PulseProtocol::new(
                pulses.iter().map(PulseSection::pulse).collect(),
            )),
            StimulusSection::Matrix { rows } => {
                Stimulus::Matrix(MatrixStimulus::from_rows(rows.clone())?)
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpanSection {
    pub first: usize,
    pub last: usize,
}

/// Myelinated positions, either as a per-position marker array (`1` marks a
/// myelinated position) or as inclusive spans. Spans apply on top of markers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct MyelinSection {
    pub markers: Option<Vec<i64>>,
    pub spans: Vec<SpanSection>,
}

fn default_record_every() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    #[serde(default)]
    pub membrane: MembraneSection,
    #[serde(default)]
    pub cable: CableSection,
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub initial: InitialSection,
    #[serde(default)]
    pub guard: GuardSection,
    #[serde(default)]
    pub stimulus: StimulusSection,
    #[serde(default)]
    pub myelin: MyelinSection,
    #[serde(default = "default_record_every")]
    pub record_every: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            membrane: MembraneSection::default(),
            cable: CableSection::default(),
            grid: GridSection::default(),
            initial: InitialSection::default(),
            guard: GuardSection::default(),
            stimulus: StimulusSection::default(),
            myelin: MyelinSection::default(),
            record_every: default_record_every(),
        }
    }
}

impl SimulationConfig {
    /// Loads a YAML file, or the flat JSON parameter format when the
    /// extension is `.json`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::load_json(path)
        } else {
            Self::load_yaml(path)
        }
    }

    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let reader = open(&path)?;
        let config: SimulationConfig = serde_yaml::from_reader(reader)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded simulation config");
        Ok(config)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let reader = open(&path)?;
        let params: LegacyParams = serde_json::from_reader(reader)
            .map_err(|source| ConfigError::Json { path: path.clone(), source })?;
        let config = params.into_config()?;
        config.validate()?;
        debug!(path = %path.display(), "loaded flat parameter file");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn spatial_grid(&self) -> Result<SpatialGrid, GridError> {
        SpatialGrid::new(self.grid.length_cm, self.grid.dx_cm)
    }

    pub fn temporal_grid(&self) -> Result<TemporalGrid, GridError> {
        TemporalGrid::new(self.grid.duration_ms, self.grid.dt_ms)
    }

    pub fn morphology(&self) -> Result<FiberMorphology, MorphologyError> {
        self.fiber(self.spatial_grid()?)
    }

    fn fiber(&self, grid: SpatialGrid) -> Result<FiberMorphology, MorphologyError> {
        let mut morphology = match &self.myelin.markers {
            Some(markers) => FiberMorphology::from_markers(grid, markers)?,
            None => FiberMorphology::bare(grid),
        };
        for span in &self.myelin.spans {
            morphology.myelinate(span.first..=span.last)?;
        }
        Ok(morphology)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            membrane: self.membrane.params(),
            cable: CableParams {
                radius: self.cable.radius,
                resistance: self.cable.resistance,
            },
            myelin_attenuation: self.cable.myelin_attenuation,
            guard: self.guard.guard(),
        }
    }

    pub fn perturbation(&self) -> Perturbation {
        self.initial
            .perturbation
            .as_ref()
            .map(PerturbationSection::perturbation)
            .unwrap_or_default()
    }

    /// Builds every run input and checks them against each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build().map(|_| ())
    }

    pub fn build(&self) -> Result<Simulation, ConfigError> {
        if self.record_every == 0 {
            return Err(SolverError::InvalidRecordStride.into());
        }
        let grid = self.spatial_grid()?;
        let temporal = self.temporal_grid()?;
        let solver = CableSolver::new(self.solver_config(), self.fiber(grid)?, temporal)?;
        let state = solver.initial_state(self.initial.conditions(), self.perturbation())?;
        let stimulus = self.stimulus.stimulus()?;
        stimulus.validate(solver.dims())?;
        Ok(Simulation {
            solver,
            state,
            stimulus,
            record_every: self.record_every,
        })
    }
}

fn open(path: &Path) -> Result<std::fs::File, ConfigError> {
    std::fs::File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
