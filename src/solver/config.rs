//! Simulator configuration.

use super::{DC_MAX_ITERATIONS, I_ABSTOL, NEWTON_LIMIT, RELTOL, TRAN_MAX_ITERATIONS, V_ABSTOL};

/// Time discretization used by transient analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    /// First-order backward Euler
    #[default]
    BackwardEuler,
    /// Second-order trapezoidal rule (first step is backward Euler)
    Trapezoidal,
}

impl IntegrationMethod {
    /// Parse a method name ("be", "euler", "trap", "trapezoidal").
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "be" | "euler" | "backward-euler" => Some(Self::BackwardEuler),
            "trap" | "trapezoidal" => Some(Self::Trapezoidal),
            _ => None,
        }
    }
}

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Absolute convergence tolerance for voltage unknowns (volts).
    pub v_abstol: f64,
    /// Absolute convergence tolerance for current unknowns (amps).
    pub i_abstol: f64,
    /// Relative convergence tolerance.
    pub reltol: f64,
    /// Voltage step limit for Newton iteration (volts).
    pub newton_limit: f64,
    /// Newton iteration budget for DC analysis.
    pub dc_max_iterations: usize,
    /// Newton iteration budget per transient step.
    pub tran_max_iterations: usize,
    /// Transient integration method.
    pub integration: IntegrationMethod,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            v_abstol: V_ABSTOL,
            i_abstol: I_ABSTOL,
            reltol: RELTOL,
            newton_limit: NEWTON_LIMIT,
            dc_max_iterations: DC_MAX_ITERATIONS,
            tran_max_iterations: TRAN_MAX_ITERATIONS,
            integration: IntegrationMethod::default(),
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the relative convergence tolerance.
    pub fn with_reltol(mut self, reltol: f64) -> Self {
        self.reltol = reltol;
        self
    }

    /// Set the absolute tolerances for voltage and current unknowns.
    pub fn with_abstol(mut self, v_abstol: f64, i_abstol: f64) -> Self {
        self.v_abstol = v_abstol;
        self.i_abstol = i_abstol;
        self
    }

    /// Set the Newton voltage step limit.
    pub fn with_newton_limit(mut self, limit: f64) -> Self {
        self.newton_limit = limit;
        self
    }

    /// Set the DC Newton iteration budget.
    pub fn with_dc_max_iterations(mut self, iterations: usize) -> Self {
        self.dc_max_iterations = iterations;
        self
    }

    /// Set the per-step transient Newton iteration budget.
    ///
    /// Sources with large instantaneous jumps need more iterations per
    /// step, since every step moves node voltages by at most the Newton
    /// limit.
    pub fn with_tran_max_iterations(mut self, iterations: usize) -> Self {
        self.tran_max_iterations = iterations;
        self
    }

    /// Set the transient integration method.
    pub fn with_integration(mut self, method: IntegrationMethod) -> Self {
        self.integration = method;
        self
    }
}
