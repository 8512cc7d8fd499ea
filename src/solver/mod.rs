//! MNA (Modified Nodal Analysis) solver.
//!
//! This module provides the numerical engine for circuit simulation.
//!
//! ## Modified Nodal Analysis
//!
//! MNA assembles a system of equations over node voltages and selected
//! branch currents:
//!
//! ```text
//! [ G   B ] [ v ]   [ i ]
//! [ C   D ] [ j ] = [ e ]
//! ```
//!
//! where:
//! - G is the conductance matrix (node equations)
//! - B, C connect voltage sources, inductors and op-amps to nodes
//! - v is the vector of node voltages
//! - j is the vector of branch currents
//! - i is the sum of current sources into each node
//! - e is the vector of voltage source values
//!
//! Nonlinear devices are handled by Newton-Raphson iteration: each pass
//! asks every device for its companion model at the current estimate and
//! solves for a correction. The right-hand side carries the negated
//! residual, `G`/`C` carry its Jacobian.
//!
//! ## Analyses
//!
//! - [`dc`] - operating point
//! - [`transient`] - companion-model time stepping from the operating point
//! - [`ac`] - small-signal sweep linearized at the operating point

pub mod ac;
mod config;
pub mod dc;
mod matrix;
mod mna;
mod newton;
pub mod transient;

pub use ac::AcResponse;
pub use config::{IntegrationMethod, SimulatorConfig};
pub use dc::DcSolution;
pub use matrix::{LinearSolution, Matrix};
pub use mna::MnaSystem;
pub use newton::{NewtonRaphson, NonConvergence, SolverState};
pub use transient::TransientResponse;

/// Absolute tolerance for voltage unknowns (volts).
pub const V_ABSTOL: f64 = 1e-6;

/// Absolute tolerance for current unknowns (amps).
pub const I_ABSTOL: f64 = 1e-12;

/// Tolerance relative to the largest magnitude seen for an unknown.
pub const RELTOL: f64 = 1e-3;

/// Largest voltage change allowed in one Newton step.
pub const NEWTON_LIMIT: f64 = 0.3;

/// Newton iteration budget for the operating point.
pub const DC_MAX_ITERATIONS: usize = 200;

/// Newton iteration budget per transient time step.
pub const TRAN_MAX_ITERATIONS: usize = 10;

/// Diagonal entry injected when a column has no usable pivot.
pub const SINGULAR_PIVOT: f64 = 1e-10;
