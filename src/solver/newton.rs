//! Newton-Raphson iteration for nonlinear circuits.
//!
//! Each iteration asks the caller to load the negated residual `-f(x)` into
//! the right-hand side and its Jacobian into the system matrix, solves for
//! the correction and applies it. Voltage corrections are clamped to keep
//! exponential devices from overshooting.

use log::trace;

use crate::circuit::UnknownKind;

use super::config::SimulatorConfig;
use super::mna::MnaSystem;

/// Per-unknown vectors shared by all analyses.
#[derive(Debug, Clone, Default)]
pub struct SolverState {
    /// Current estimate of every unknown
    pub solution: Vec<f64>,
    /// Right-hand side scratch vector
    pub rhs: Vec<f64>,
    /// Largest magnitude seen for each unknown
    pub soln_max: Vec<f64>,
    /// Absolute tolerance of each unknown
    pub abstol: Vec<f64>,
    /// Kind of each unknown
    pub kinds: Vec<UnknownKind>,
}

impl SolverState {
    /// Zeroed state for the given unknowns.
    pub fn new(kinds: &[UnknownKind], config: &SimulatorConfig) -> Self {
        let n = kinds.len();
        let abstol = kinds
            .iter()
            .map(|k| match k {
                UnknownKind::Voltage => config.v_abstol,
                UnknownKind::Current => config.i_abstol,
            })
            .collect();
        Self {
            solution: vec![0.0; n],
            rhs: vec![0.0; n],
            soln_max: vec![0.0; n],
            abstol,
            kinds: kinds.to_vec(),
        }
    }
}

/// Newton iteration ran out of its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonConvergence {
    /// Last unknown whose correction exceeded its tolerance
    pub unknown: usize,
    /// Iterations spent
    pub iterations: usize,
}

/// Newton-Raphson solver.
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Voltage step limit
    pub newton_limit: f64,
    /// Relative tolerance
    pub reltol: f64,
    /// Columns that needed a synthetic pivot on the last solve
    patched: Vec<usize>,
}

impl NewtonRaphson {
    /// Create a solver with the tolerances of `config`.
    pub fn new(config: &SimulatorConfig, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            newton_limit: config.newton_limit,
            reltol: config.reltol,
            patched: Vec::new(),
        }
    }

    /// Columns that needed a synthetic pivot during the final iteration.
    pub fn patched(&self) -> &[usize] {
        &self.patched
    }

    /// Iterate until every correction is within tolerance.
    ///
    /// `load(sys, x, rhs)` must fill `rhs` with `-f(x)` and the leading
    /// `N x N` block of `sys.matrix` with `df/dx`. Returns the number of
    /// iterations used.
    pub fn solve<F>(
        &mut self,
        state: &mut SolverState,
        sys: &mut MnaSystem,
        mut load: F,
    ) -> std::result::Result<usize, NonConvergence>
    where
        F: FnMut(&mut MnaSystem, &[f64], &mut [f64]),
    {
        let n = state.solution.len();
        let mut problem = 0;

        for iter in 0..self.max_iterations {
            state.rhs.fill(0.0);
            load(sys, &state.solution, &mut state.rhs);

            let step = sys.matrix.solve_with_rhs(&state.rhs);
            self.patched = step.patched;
            let mut delta = step.x;

            let mut converged = true;
            for i in 0..n {
                if state.kinds[i] == UnknownKind::Voltage {
                    delta[i] = delta[i].clamp(-self.newton_limit, self.newton_limit);
                }
                state.solution[i] += delta[i];
                state.soln_max[i] = state.soln_max[i].max(state.solution[i].abs());

                let threshold = state.abstol[i] + self.reltol * state.soln_max[i];
                if delta[i].abs() > threshold {
                    converged = false;
                    problem = i;
                }
            }

            trace!(
                "newton iteration {}: worst unknown {} (delta {:.3e})",
                iter + 1,
                problem,
                delta.get(problem).copied().unwrap_or(0.0)
            );

            if converged {
                return Ok(iter + 1);
            }
        }

        Err(NonConvergence {
            unknown: problem,
            iterations: self.max_iterations,
        })
    }
}
