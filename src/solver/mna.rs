//! MNA system storage and stamp helpers.
//!
//! The linearized circuit is written as
//!
//! ```text
//! C dx/dt + G x = rhs
//! ```
//!
//! where `x` holds node voltages and branch currents, `G` conductances and
//! the ±1 couplings of branch equations, and `C` capacitances and
//! inductances. `Gl` keeps the strictly linear part of `G` so it only has
//! to be assembled once.
//!
//! Devices never touch the matrices directly; every contribution goes
//! through the stamp methods below, which also take care of dropping the
//! ground row and column.

use crate::circuit::NodeId;

use super::matrix::Matrix;

/// The persistent matrices of a finalized circuit.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// Number of unknowns
    pub(crate) size: usize,
    /// Strictly linear conductances
    pub(crate) gl: Matrix,
    /// Working conductance matrix (linear + current linearization)
    pub(crate) g: Matrix,
    /// Capacitances and inductances
    pub(crate) c: Matrix,
    /// Augmented `N x (N+1)` system handed to the solver
    pub(crate) matrix: Matrix,
}

impl MnaSystem {
    /// Allocate all matrices for `size` unknowns.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            gl: Matrix::zeros(size, size),
            g: Matrix::zeros(size, size),
            c: Matrix::zeros(size, size),
            matrix: Matrix::zeros(size, size + 1),
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The strictly linear conductance matrix.
    pub fn linear_conductance(&self) -> &Matrix {
        &self.gl
    }

    /// The working conductance matrix.
    pub fn conductance(&self) -> &Matrix {
        &self.g
    }

    /// The reactive matrix.
    pub fn reactance(&self) -> &Matrix {
        &self.c
    }

    /// Stamp a two-terminal element of value `v` into `m`.
    ///   M[i,i] += v, M[j,j] += v, M[i,j] -= v, M[j,i] -= v
    fn add_two_terminal(m: &mut Matrix, i: NodeId, j: NodeId, v: f64) {
        if let Some(i) = i.index() {
            m.add(i, i, v);
        }
        if let Some(j) = j.index() {
            m.add(j, j, v);
        }
        if let (Some(i), Some(j)) = (i.index(), j.index()) {
            m.add(i, j, -v);
            m.add(j, i, -v);
        }
    }

    fn add_entry(m: &mut Matrix, i: NodeId, j: NodeId, v: f64) {
        if let (Some(i), Some(j)) = (i.index(), j.index()) {
            m.add(i, j, v);
        }
    }

    /// Stamp a linear conductance between two nodes into `Gl`.
    pub fn add_linear_conductance(&mut self, i: NodeId, j: NodeId, g: f64) {
        Self::add_two_terminal(&mut self.gl, i, j, g);
    }

    /// Stamp a linearized conductance between two nodes into `G`.
    pub fn add_conductance(&mut self, i: NodeId, j: NodeId, g: f64) {
        Self::add_two_terminal(&mut self.g, i, j, g);
    }

    /// Stamp a capacitance between two nodes into `C`.
    pub fn add_capacitance(&mut self, i: NodeId, j: NodeId, c: f64) {
        Self::add_two_terminal(&mut self.c, i, j, c);
    }

    /// Add a single entry to `Gl`.
    pub fn add_to_gl(&mut self, i: NodeId, j: NodeId, v: f64) {
        Self::add_entry(&mut self.gl, i, j, v);
    }

    /// Add a single entry to `G`.
    pub fn add_to_g(&mut self, i: NodeId, j: NodeId, v: f64) {
        Self::add_entry(&mut self.g, i, j, v);
    }

    /// Add a single entry to `C`.
    pub fn add_to_c(&mut self, i: NodeId, j: NodeId, v: f64) {
        Self::add_entry(&mut self.c, i, j, v);
    }

    /// Add a source term to a right-hand-side vector.
    pub fn add_to_rhs(rhs: &mut [f64], i: NodeId, v: f64) {
        if let Some(i) = i.index() {
            rhs[i] += v;
        }
    }
}
