//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / Vt) - 1)
//!
//! For Newton-Raphson iteration, we linearize around the current operating point:
//!   I ≈ I0 + G_d * (V - V0)
//!
//! where G_d = dI/dV = Is/Vt * exp(V0/Vt)
//!
//! Past an exponent argument of [`EXP_ARG_MAX`] the exponential is
//! continued with its second-order Taylor expansion so large Newton
//! estimates cannot overflow.

use crate::circuit::{across, NodeId};
use crate::solver::MnaSystem;
use crate::THERMAL_VOLTAGE;

use super::Device;

/// Saturation current per unit area (A).
pub const SATURATION_CURRENT: f64 = 1e-14;

/// Emission voltage of the near-ideal diode (V).
pub const IDEAL_VT: f64 = 1e-4;

/// Exponent argument beyond which `exp` is continued quadratically.
pub const EXP_ARG_MAX: f64 = 50.0;

/// Diode flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiodeKind {
    /// Silicon junction at room temperature
    #[default]
    Normal,
    /// Near-ideal switch with a very sharp knee
    Ideal,
}

impl DiodeKind {
    /// Parse the netlist `type` property. Anything but "ideal" is normal.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("ideal") {
            DiodeKind::Ideal
        } else {
            DiodeKind::Normal
        }
    }

    /// Emission voltage for this kind.
    pub fn vt(&self) -> f64 {
        match self {
            DiodeKind::Normal => THERMAL_VOLTAGE,
            DiodeKind::Ideal => IDEAL_VT,
        }
    }
}

/// A diode component.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub nodes: [NodeId; 2], // [anode, cathode]
    pub area: f64,
    pub kind: DiodeKind,
    /// Area-scaled saturation current
    ais: f64,
    vt: f64,
}

impl Diode {
    /// Create a new diode.
    pub fn new(name: String, nodes: [NodeId; 2], area: f64, kind: DiodeKind) -> Self {
        Self {
            name,
            nodes,
            area,
            kind,
            ais: area * SATURATION_CURRENT,
            vt: kind.vt(),
        }
    }

    /// Current and conductance `(id, gd)` at junction voltage `vd`.
    pub fn evaluate(&self, vd: f64) -> (f64, f64) {
        let exp_arg = vd / self.vt;
        let abs_arg = exp_arg.abs();
        let d_arg = abs_arg - EXP_ARG_MAX;

        // temp1 ~ exp(|arg|), temp2 ~ its derivative
        let (mut temp1, mut temp2) = if d_arg > 0.0 {
            let exp_max = EXP_ARG_MAX.exp();
            (
                exp_max * (1.0 + d_arg + 0.5 * d_arg * d_arg),
                exp_max * (1.0 + d_arg),
            )
        } else {
            let e = abs_arg.exp();
            (e, e)
        };
        if exp_arg < 0.0 {
            // exp(-x) = 1/exp(x), d/dx exp(-x) = exp'(x)/exp(x)^2
            temp1 = 1.0 / temp1;
            temp2 *= temp1 * temp1;
        }

        let id = self.ais * (temp1 - 1.0);
        let gd = self.ais * temp2 / self.vt;
        (id, gd)
    }

    /// Calculate the diode current at a given voltage.
    pub fn current(&self, vd: f64) -> f64 {
        self.evaluate(vd).0
    }
}

impl Device for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_dc(&self, sys: &mut MnaSystem, x: &[f64], rhs: &mut [f64]) {
        let [anode, cathode] = self.nodes;
        let (id, gd) = self.evaluate(across(anode, cathode, x));

        // Current flows into the anode and out of the cathode
        MnaSystem::add_to_rhs(rhs, anode, -id);
        MnaSystem::add_to_rhs(rhs, cathode, id);
        sys.add_conductance(anode, cathode, gd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn diode(kind: DiodeKind) -> Diode {
        Diode::new("D1".into(), [NodeId::new(0), NodeId::GROUND], 1.0, kind)
    }

    #[test]
    fn test_diode_forward_bias() {
        let d = diode(DiodeKind::Normal);

        // At 0V, current should be approximately 0
        assert!(d.current(0.0).abs() < 1e-20);

        // At forward bias, current should increase exponentially
        let i_small = d.current(0.3);
        let i_large = d.current(0.6);
        assert!(i_large > i_small * 100.0);
        assert_relative_eq!(i_large, 1e-14 * ((0.6f64 / 0.0258).exp() - 1.0), max_relative = 1e-12);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = diode(DiodeKind::Normal);

        // In reverse bias, current should approach -Is
        let (i_rev, g_rev) = d.evaluate(-1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * SATURATION_CURRENT);
        assert!(g_rev > 0.0 && g_rev < 1e-20);
    }

    #[test]
    fn test_exponent_is_continued_past_limit() {
        let d = diode(DiodeKind::Ideal);
        // 1V / 0.1mV is far past the limit
        let (id, gd) = d.evaluate(1.0);
        assert!(id.is_finite() && gd.is_finite());

        // Continuous at the limit
        let v_lim = EXP_ARG_MAX * IDEAL_VT;
        let below = d.current(v_lim * (1.0 - 1e-9));
        let above = d.current(v_lim * (1.0 + 1e-9));
        assert_relative_eq!(below, above, max_relative = 1e-6);
    }

    #[test]
    fn test_conductance_matches_derivative() {
        let d = diode(DiodeKind::Normal);
        let v = 0.55;
        let h = 1e-7;
        let numeric = (d.current(v + h) - d.current(v - h)) / (2.0 * h);
        assert_relative_eq!(d.evaluate(v).1, numeric, max_relative = 1e-5);
    }

    #[test]
    fn test_stamp_signs() {
        let d = diode(DiodeKind::Normal);
        let mut sys = MnaSystem::new(1);
        let mut rhs = vec![0.0];
        d.load_dc(&mut sys, &[0.6], &mut rhs);
        let (id, gd) = d.evaluate(0.6);
        assert_eq!(rhs[0], -id);
        assert_eq!(sys.g[(0, 0)], gd);
        assert_eq!(DiodeKind::from_name("ideal"), DiodeKind::Ideal);
        assert_eq!(DiodeKind::from_name("normal"), DiodeKind::Normal);
    }
}
