use serde::Deserialize;

use crate::config::{
    CableSection, ConfigError, GridSection, InitialSection, MembraneSection, MyelinSection,
    PerturbationSection, SimulationConfig, StimulusSection,
};

/// Potential written to the centre position before the first step.
pub const LEGACY_CENTRE_KICK_MV: f64 = 20.0;

/// Flat parameter file: scalar keys with their historical defaults, the
/// stimulus matrix `J` and the myelin marker array `Mie`.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyParams {
    #[serde(default = "one")]
    pub cm: f64,
    #[serde(default = "one")]
    pub a: f64,
    #[serde(default = "one")]
    pub rl: f64,
    #[serde(default = "default_gna")]
    pub gna: f64,
    #[serde(default = "default_gk")]
    pub gk: f64,
    #[serde(default = "default_gl")]
    pub gl: f64,
    #[serde(default = "default_ena")]
    pub ena: f64,
    #[serde(default = "default_ek")]
    pub ek: f64,
    #[serde(default = "default_el")]
    pub el: f64,
    #[serde(rename = "T_max", default = "default_t_max")]
    pub t_max: f64,
    #[serde(rename = "L_max", default = "one")]
    pub l_max: f64,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_dx")]
    pub dx: f64,
    #[serde(default = "default_vm0")]
    pub vm0: f64,
    #[serde(default = "default_m0")]
    pub m0: f64,
    #[serde(default = "default_h0")]
    pub h0: f64,
    #[serde(default = "default_n0")]
    pub n0: f64,
    #[serde(rename = "J")]
    pub j: Vec<Vec<f64>>,
    #[serde(rename = "Mie")]
    pub mie: Vec<i64>,
}

impl LegacyParams {
    /// Maps onto the typed config so that the flat update
    /// `dV = dt / (cm * a) * (rl * lap(V) - I_ion + J)` is reproduced: the
    /// membrane capacitance becomes `cm * a` and the resistance `a / (2 * rl)`,
    /// which makes the diffusion coefficient `a / (2 * R)` equal to `rl`.
    ///
    /// Row `t` of `J` drives the step that ends at `t`, so a matrix with one
    /// row more than the step count drops its first row.
    pub fn into_config(self) -> Result<SimulationConfig, ConfigError> {
        let grid = GridSection {
            length_cm: self.l_max,
            dx_cm: self.dx,
            duration_ms: self.t_max,
            dt_ms: self.dt,
        };
        let mut config = SimulationConfig {
            membrane: MembraneSection {
                c_m: self.cm * self.a,
                g_na: self.gna,
                g_k: self.gk,
                g_l: self.gl,
                e_na: self.ena,
                e_k: self.ek,
                e_l: self.el,
            },
            cable: CableSection {
                radius: self.a,
                resistance: self.a / (2.0 * self.rl),
                ..CableSection::default()
            },
            grid,
            initial: InitialSection {
                v: self.vm0,
                m: self.m0,
                h: self.h0,
                n: self.n0,
                perturbation: None,
            },
            myelin: MyelinSection {
                markers: Some(self.mie),
                spans: Vec::new(),
            },
            ..SimulationConfig::default()
        };

        let positions = config.spatial_grid()?.len();
        let steps = config.temporal_grid()?.len();
        config.initial.perturbation = Some(PerturbationSection {
            first: positions / 2,
            last: None,
            v: LEGACY_CENTRE_KICK_MV,
        });

        let mut rows = self.j;
        if rows.len() == steps + 1 {
            rows.remove(0);
        }
        config.stimulus = StimulusSection::Matrix { rows };
        Ok(config)
    }
}

fn one() -> f64 {
    1.0
}

fn default_gna() -> f64 {
    120.0
}

fn default_gk() -> f64 {
    36.0
}

fn default_gl() -> f64 {
    0.3
}

fn default_ena() -> f64 {
    50.0
}

fn default_ek() -> f64 {
    -77.0
}

fn default_el() -> f64 {
    -54.4
}

fn default_t_max() -> f64 {
    10.0
}

fn default_dt() -> f64 {
    0.0001
}

fn default_dx() -> f64 {
    0.001
}

fn default_vm0() -> f64 {
    -65.0
}

fn default_m0() -> f64 {
    0.05
}

fn default_h0() -> f64 {
    0.6
}

fn default_n0() -> f64 {
    0.32
}
