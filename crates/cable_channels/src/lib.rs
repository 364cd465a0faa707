#![forbid(unsafe_code)]

//! Hodgkin-Huxley rate kinetics and ionic currents.
//!
//! Rates are in 1/ms for a potential in mV, using the modern convention with
//! rest near -65 mV. Every exponential goes through [`safe_exp`], so transient
//! potentials far outside the physiological band produce large but finite
//! rates instead of `inf`.

use cable_core::{GateKind, MembraneParams};

/// Exponential arguments are clamped to `[-EXP_ARG_LIMIT, EXP_ARG_LIMIT]`.
pub const EXP_ARG_LIMIT: f64 = 100.0;
/// Bases of [`safe_powi`] are clamped to `[-POWER_BASE_LIMIT, POWER_BASE_LIMIT]`.
pub const POWER_BASE_LIMIT: f64 = 1e3;
/// Below this `|u|` the removable singularity of [`linoid`] takes its
/// first-order analytic limit.
pub const SINGULAR_TOLERANCE: f64 = 1e-7;

pub fn safe_exp(x: f64) -> f64 {
    x.clamp(-EXP_ARG_LIMIT, EXP_ARG_LIMIT).exp()
}

pub fn safe_powi(base: f64, exponent: i32) -> f64 {
    base.clamp(-POWER_BASE_LIMIT, POWER_BASE_LIMIT).powi(exponent)
}

/// `scale * (v + offset) / (1 - exp(-(v + offset) / slope))`.
///
/// Rewritten as `scale * slope * u / -expm1(-u)` with `u = (v + offset) / slope`,
/// which stays accurate as `u -> 0` where the limit is `scale * slope`.
pub fn linoid(scale: f64, offset: f64, slope: f64, v: f64) -> f64 {
    let u = (v + offset) / slope;
    if u.abs() < SINGULAR_TOLERANCE {
        return scale * slope * (1.0 + 0.5 * u);
    }
    let denominator = -(-u).clamp(-EXP_ARG_LIMIT, EXP_ARG_LIMIT).exp_m1();
    scale * slope * u / denominator
}

pub fn alpha_m(v: f64) -> f64 {
    linoid(0.1, 40.0, 10.0, v)
}

pub fn beta_m(v: f64) -> f64 {
    4.0 * safe_exp(-(v + 65.0) / 18.0)
}

pub fn alpha_h(v: f64) -> f64 {
    0.07 * safe_exp(-(v + 65.0) / 20.0)
}

pub fn beta_h(v: f64) -> f64 {
    1.0 / (1.0 + safe_exp(-(v + 35.0) / 10.0))
}

pub fn alpha_n(v: f64) -> f64 {
    linoid(0.01, 55.0, 10.0, v)
}

pub fn beta_n(v: f64) -> f64 {
    0.125 * safe_exp(-(v + 65.0) / 80.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateRates {
    pub alpha: f64,
    pub beta: f64,
}

impl GateRates {
    pub fn at(kind: GateKind, v: f64) -> Self {
        let (alpha, beta) = match kind {
            GateKind::M => (alpha_m(v), beta_m(v)),
            GateKind::H => (alpha_h(v), beta_h(v)),
            GateKind::N => (alpha_n(v), beta_n(v)),
        };
        Self { alpha, beta }
    }

    pub fn steady_state(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn time_constant(&self) -> f64 {
        1.0 / (self.alpha + self.beta)
    }

    /// Explicit Euler step of `dx/dt = alpha (1 - x) - beta x`.
    pub fn advance(&self, x: f64, dt_ms: f64) -> f64 {
        x + dt_ms * (self.alpha * (1.0 - x) - self.beta * x)
    }
}

pub fn steady_state(kind: GateKind, v: f64) -> f64 {
    GateRates::at(kind, v).steady_state()
}

pub fn time_constant(kind: GateKind, v: f64) -> f64 {
    GateRates::at(kind, v).time_constant()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatingState {
    pub m: f64,
    pub h: f64,
    pub n: f64,
}

impl GatingState {
    pub fn from_voltage(v: f64) -> Self {
        Self {
            m: steady_state(GateKind::M, v),
            h: steady_state(GateKind::H, v),
            n: steady_state(GateKind::N, v),
        }
    }

    pub fn get(&self, kind: GateKind) -> f64 {
        match kind {
            GateKind::M => self.m,
            GateKind::H => self.h,
            GateKind::N => self.n,
        }
    }

    pub fn set(&mut self, kind: GateKind, value: f64) {
        match kind {
            GateKind::M => self.m = value,
            GateKind::H => self.h = value,
            GateKind::N => self.n = value,
        }
    }

    /// Advances all three gates with rates taken at `v`. Values are not
    /// clamped to `[0, 1]`; large `dt_ms` can overshoot.
    pub fn update(&mut self, v: f64, dt_ms: f64) {
        for kind in GateKind::ALL {
            let next = GateRates::at(kind, v).advance(self.get(kind), dt_ms);
            self.set(kind, next);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leak {
    pub g: f64,
    pub e_rev: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaK {
    pub g_na: f64,
    pub g_k: f64,
    pub e_na: f64,
    pub e_k: f64,
}

impl From<&MembraneParams> for Leak {
    fn from(params: &MembraneParams) -> Self {
        Self {
            g: params.g_l,
            e_rev: params.e_l,
        }
    }
}

impl From<&MembraneParams> for NaK {
    fn from(params: &MembraneParams) -> Self {
        Self {
            g_na: params.g_na,
            g_k: params.g_k,
            e_na: params.e_na,
            e_k: params.e_k,
        }
    }
}

/// Outward-positive membrane currents (uA/cm^2).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IonicCurrents {
    pub na: f64,
    pub k: f64,
    pub leak: f64,
}

impl IonicCurrents {
    pub fn total(&self) -> f64 {
        self.na + self.k + self.leak
    }
}

pub fn leak_current(leak: Leak, v: f64) -> f64 {
    leak.g * (v - leak.e_rev)
}

pub fn sodium_current(channel: NaK, gates: GatingState, v: f64) -> f64 {
    channel.g_na * safe_powi(gates.m, 3) * gates.h * (v - channel.e_na)
}

pub fn potassium_current(channel: NaK, gates: GatingState, v: f64) -> f64 {
    channel.g_k * safe_powi(gates.n, 4) * (v - channel.e_k)
}

pub fn nak_current(channel: NaK, gates: GatingState, v: f64) -> f64 {
    sodium_current(channel, gates, v) + potassium_current(channel, gates, v)
}

pub fn ionic_currents(params: &MembraneParams, gates: GatingState, v: f64) -> IonicCurrents {
    let nak = NaK::from(params);
    IonicCurrents {
        na: sodium_current(nak, gates, v),
        k: potassium_current(nak, gates, v),
        leak: leak_current(Leak::from(params), v),
    }
}

/// Leak reversal that makes the net current vanish at `v_rest` with all gates
/// at steady state. `None` when the leak conductance is zero.
pub fn balanced_leak_reversal(params: &MembraneParams, v_rest: f64) -> Option<f64> {
    if params.g_l == 0.0 {
        return None;
    }
    let gates = GatingState::from_voltage(v_rest);
    let active = nak_current(NaK::from(params), gates, v_rest);
    Some(v_rest + active / params.g_l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linoid_limit_matches_neighbors() {
        let at = alpha_m(-40.0);
        let left = alpha_m(-40.0 - 1e-6);
        let right = alpha_m(-40.0 + 1e-6);
        assert!((at - 1.0).abs() < 1e-12);
        assert!((left - at).abs() < 1e-6);
        assert!((right - at).abs() < 1e-6);
    }

    #[test]
    fn safe_exp_never_overflows() {
        assert!(safe_exp(1e6).is_finite());
        assert_eq!(safe_exp(1e6), EXP_ARG_LIMIT.exp());
        assert!(safe_exp(-1e6) > 0.0);
    }

    #[test]
    fn safe_powi_clamps_base() {
        assert!((safe_powi(1e9, 4) - 1e12).abs() < 1.0);
        assert!((safe_powi(0.5, 3) - 0.125).abs() < 1e-15);
    }
}
