//! Core types for circuit representation.

use std::fmt;

/// Index of an unknown in the MNA solution vector.
///
/// Node voltages and branch currents share one dense, zero-based index
/// space assigned in registration order. Ground is a sentinel that never
/// receives a row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// The ground node.
    pub const GROUND: NodeId = NodeId(usize::MAX);

    /// Wrap a raw solution-vector index.
    pub fn new(index: usize) -> Self {
        debug_assert!(index != usize::MAX, "index collides with ground sentinel");
        NodeId(index)
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        *self == Self::GROUND
    }

    /// Get the raw index into the solution vector, `None` for ground.
    pub fn index(&self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Read this unknown from a solution vector (ground reads as zero).
    pub fn value_in(&self, x: &[f64]) -> f64 {
        self.index().map_or(0.0, |i| x[i])
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            None => write!(f, "GND"),
            Some(i) => write!(f, "x{}", i),
        }
    }
}

/// What an unknown measures. Selects the absolute convergence tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownKind {
    /// Node voltage
    Voltage,
    /// Branch current (voltage sources, inductors, op-amp outputs)
    Current,
}

/// Difference `x[i] - x[j]` with ground reading as zero.
pub fn across(i: NodeId, j: NodeId, x: &[f64]) -> f64 {
    i.value_in(x) - j.value_in(x)
}
