//! Operational amplifier model.
//!
//! A finite-gain voltage-controlled voltage source. The output branch
//! enforces
//!   (v(out) - v(gnd)) / A - (v(+) - v(-)) = 0
//! and carries the output current from `out` to `gnd`. With large `A`
//! this approaches the ideal op-amp.

use crate::circuit::NodeId;
use crate::solver::MnaSystem;

use super::Device;

/// An operational amplifier component.
#[derive(Debug, Clone)]
pub struct OpAmp {
    pub name: String,
    pub nodes: [NodeId; 4], // [non-inverting (+), inverting (-), output, ground reference]
    /// Open-loop gain
    pub gain: f64,
    pub branch: NodeId,
}

impl OpAmp {
    /// Create a new op-amp.
    pub fn new(name: String, nodes: [NodeId; 4], gain: f64, branch: NodeId) -> Self {
        Self {
            name,
            nodes,
            gain,
            branch,
        }
    }
}

impl Device for OpAmp {
    fn name(&self) -> &str {
        &self.name
    }

    fn branch(&self) -> Option<NodeId> {
        Some(self.branch)
    }

    fn load_linear(&self, sys: &mut MnaSystem) {
        let [np, nn, no, ng] = self.nodes;
        let br = self.branch;
        let inv_a = 1.0 / self.gain;
        sys.add_to_gl(no, br, 1.0);
        sys.add_to_gl(ng, br, -1.0);
        sys.add_to_gl(br, no, inv_a);
        sys.add_to_gl(br, ng, -inv_a);
        sys.add_to_gl(br, np, -1.0);
        sys.add_to_gl(br, nn, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcvs_stamp() {
        let mut sys = MnaSystem::new(4);
        let op = OpAmp::new(
            "U1".into(),
            [NodeId::new(0), NodeId::new(1), NodeId::new(2), NodeId::GROUND],
            1e5,
            NodeId::new(3),
        );
        op.load_linear(&mut sys);
        assert_eq!(sys.gl[(2, 3)], 1.0);
        assert_eq!(sys.gl[(3, 2)], 1e-5);
        assert_eq!(sys.gl[(3, 0)], -1.0);
        assert_eq!(sys.gl[(3, 1)], 1.0);
        // Nonlinear and reactive parts untouched
        assert_eq!(sys.g[(3, 3)], 0.0);
        assert_eq!(sys.c[(3, 3)], 0.0);
    }
}
