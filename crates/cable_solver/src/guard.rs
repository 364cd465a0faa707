use cable_channels::GatingState;
use cable_core::{GateKind, V_REST_MV};

/// Clamp band and fallback values applied after every interior update.
///
/// These are stabilization knobs for explicit Euler under stiff kinetics,
/// not membrane physiology.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityGuard {
    pub enabled: bool,
    pub v_min: f64,
    pub v_max: f64,
    pub v_fallback: f64,
    pub m_fallback: f64,
    pub h_fallback: f64,
    pub n_fallback: f64,
    /// Per-update trigger rate above which a run is reported unstable.
    pub warn_rate: f64,
}

impl Default for StabilityGuard {
    fn default() -> Self {
        Self {
            enabled: true,
            v_min: -100.0,
            v_max: 50.0,
            v_fallback: V_REST_MV,
            m_fallback: 0.05,
            h_fallback: 0.6,
            n_fallback: 0.32,
            warn_rate: 0.01,
        }
    }
}

impl StabilityGuard {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn fallback(&self, kind: GateKind) -> f64 {
        match kind {
            GateKind::M => self.m_fallback,
            GateKind::H => self.h_fallback,
            GateKind::N => self.n_fallback,
        }
    }

    pub(crate) fn stabilize(
        &self,
        v: f64,
        gates: &mut GatingState,
        stats: &mut GuardStats,
    ) -> (f64, u32) {
        if !self.enabled {
            return (v, 0);
        }
        let mut triggers = 0;
        let v = if !v.is_finite() {
            stats.potential_resets += 1;
            triggers += 1;
            self.v_fallback
        } else if v < self.v_min || v > self.v_max {
            stats.potential_clamps += 1;
            triggers += 1;
            v.clamp(self.v_min, self.v_max)
        } else {
            v
        };
        for kind in GateKind::ALL {
            if !gates.get(kind).is_finite() {
                gates.set(kind, self.fallback(kind));
                stats.gate_resets += 1;
                triggers += 1;
            }
        }
        (v, triggers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardStats {
    pub potential_clamps: u64,
    pub potential_resets: u64,
    pub gate_resets: u64,
    /// Steps in which at least one interior update was guarded.
    pub guarded_steps: u64,
    pub steps: u64,
    pub updates: u64,
}

impl GuardStats {
    pub fn triggers(&self) -> u64 {
        self.potential_clamps + self.potential_resets + self.gate_resets
    }

    pub fn trigger_rate(&self) -> f64 {
        if self.updates == 0 {
            return 0.0;
        }
        self.triggers() as f64 / self.updates as f64
    }

    pub fn exceeds(&self, rate: f64) -> bool {
        self.trigger_rate() > rate
    }

    /// Every completed step needed the guard.
    pub fn diverged(&self) -> bool {
        self.steps > 0 && self.guarded_steps == self.steps
    }
}
