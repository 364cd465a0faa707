#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionIndex(pub u32);

impl PositionIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl StepIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GateKind {
    M,
    H,
    N,
}

impl GateKind {
    pub const ALL: [GateKind; 3] = [GateKind::M, GateKind::H, GateKind::N];

    pub fn label(self) -> &'static str {
        match self {
            GateKind::M => "m",
            GateKind::H => "h",
            GateKind::N => "n",
        }
    }
}

/// Membrane capacitance (uF/cm^2), maximal conductances (mS/cm^2) and
/// reversal potentials (mV).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembraneParams {
    pub c_m: f64,
    pub g_na: f64,
    pub g_k: f64,
    pub g_l: f64,
    pub e_na: f64,
    pub e_k: f64,
    pub e_l: f64,
}

impl Default for MembraneParams {
    fn default() -> Self {
        Self {
            c_m: 1.0,
            g_na: 120.0,
            g_k: 36.0,
            g_l: 0.3,
            e_na: 50.0,
            e_k: -77.0,
            e_l: -54.387,
        }
    }
}

/// Axon radius and longitudinal resistance. The diffusion coefficient of the
/// cable term is `radius / (2 * resistance)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CableParams {
    pub radius: f64,
    pub resistance: f64,
}

impl Default for CableParams {
    fn default() -> Self {
        Self {
            radius: 15.0,
            resistance: 5000.0,
        }
    }
}

impl CableParams {
    pub fn diffusion_coefficient(&self) -> f64 {
        self.radius / (2.0 * self.resistance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialConditions {
    pub v: f64,
    pub m: f64,
    pub h: f64,
    pub n: f64,
}

pub const V_REST_MV: f64 = -65.0;

impl Default for InitialConditions {
    fn default() -> Self {
        Self {
            v: V_REST_MV,
            m: 0.0529,
            h: 0.5961,
            n: 0.3177,
        }
    }
}

impl InitialConditions {
    pub fn gate(&self, kind: GateKind) -> f64 {
        match kind {
            GateKind::M => self.m,
            GateKind::H => self.h,
            GateKind::N => self.n,
        }
    }
}

pub fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Largest interval count a grid may hold. Step and position indices are
/// `u32`, and an inclusive grid adds one endpoint.
pub const MAX_INTERVALS: usize = u32::MAX as usize - 1;

/// `floor(numerator / step)` tolerant of representation error, so that
/// `3.0 / 0.01` counts 300 intervals rather than 299. `None` when the ratio is
/// not finite or exceeds [`MAX_INTERVALS`].
pub fn interval_count(numerator: f64, step: f64) -> Option<usize> {
    let ratio = numerator / step;
    if !ratio.is_finite() || ratio > MAX_INTERVALS as f64 {
        return None;
    }
    let nearest = ratio.round();
    let count = if (ratio - nearest).abs() <= 1e-9 * nearest.abs().max(1.0) {
        nearest
    } else {
        ratio.floor()
    };
    Some(count.max(0.0) as usize)
}
