//! Linear passive components: Resistor, Capacitor, Inductor.

use crate::circuit::NodeId;
use crate::solver::MnaSystem;

use super::Device;

/// A resistor.
///
/// Zero resistance is never constructed here; the circuit registers a
/// zero-volt voltage source instead.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(name: String, nodes: [NodeId; 2], resistance: f64) -> Self {
        Self {
            name,
            nodes,
            resistance,
        }
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Device for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_linear(&self, sys: &mut MnaSystem) {
        sys.add_linear_conductance(self.nodes[0], self.nodes[1], self.conductance());
    }
}

/// A capacitor.
///
/// Open at DC. In transient analysis its charge `C * v` enters through the
/// reactive matrix and the integrator turns it into a companion conductance.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub capacitance: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(name: String, nodes: [NodeId; 2], capacitance: f64) -> Self {
        Self {
            name,
            nodes,
            capacitance,
        }
    }
}

impl Device for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_linear(&self, sys: &mut MnaSystem) {
        sys.add_capacitance(self.nodes[0], self.nodes[1], self.capacitance);
    }
}

/// An inductor.
///
/// Owns a branch-current unknown. The branch equation is
///   -v1 + v2 + L di/dt = 0
/// so the inductor is a short at DC.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub nodes: [NodeId; 2],
    pub inductance: f64,
    pub branch: NodeId,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(name: String, nodes: [NodeId; 2], inductance: f64, branch: NodeId) -> Self {
        Self {
            name,
            nodes,
            inductance,
            branch,
        }
    }
}

impl Device for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn branch(&self) -> Option<NodeId> {
        Some(self.branch)
    }

    fn load_linear(&self, sys: &mut MnaSystem) {
        let [n1, n2] = self.nodes;
        let br = self.branch;
        // Branch current leaves n1 and enters n2
        sys.add_to_gl(n1, br, 1.0);
        sys.add_to_gl(n2, br, -1.0);
        sys.add_to_gl(br, n1, -1.0);
        sys.add_to_gl(br, n2, 1.0);
        sys.add_to_c(br, br, self.inductance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_stamp() {
        let mut sys = MnaSystem::new(2);
        let r = Resistor::new("R1".into(), [NodeId::new(0), NodeId::new(1)], 500.0);
        r.load_linear(&mut sys);
        assert_eq!(sys.gl[(0, 0)], 2e-3);
        assert_eq!(sys.gl[(1, 0)], -2e-3);
        assert_eq!(sys.c[(0, 0)], 0.0);
    }

    #[test]
    fn test_capacitor_open_at_dc() {
        let mut sys = MnaSystem::new(1);
        let c = Capacitor::new("C1".into(), [NodeId::new(0), NodeId::GROUND], 1e-6);
        c.load_linear(&mut sys);

        let mut rhs = vec![0.0];
        c.load_dc(&mut sys, &[1.0], &mut rhs);
        assert_eq!(rhs[0], 0.0);
        assert_eq!(sys.gl[(0, 0)], 0.0);
        assert_eq!(sys.c[(0, 0)], 1e-6);
    }

    #[test]
    fn test_inductor_branch_stamp() {
        let mut sys = MnaSystem::new(2);
        let l = Inductor::new(
            "L1".into(),
            [NodeId::new(0), NodeId::GROUND],
            1e-3,
            NodeId::new(1),
        );
        l.load_linear(&mut sys);
        assert_eq!(l.branch(), Some(NodeId::new(1)));
        assert_eq!(sys.gl[(0, 1)], 1.0);
        assert_eq!(sys.gl[(1, 0)], -1.0);
        assert_eq!(sys.c[(1, 1)], 1e-3);
        assert_eq!(sys.c[(0, 0)], 0.0);
    }
}
