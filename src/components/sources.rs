//! Independent voltage and current sources.

use crate::circuit::NodeId;
use crate::netlist::Waveform;
use crate::solver::MnaSystem;

use super::Device;

/// An independent voltage source.
///
/// Voltage sources require an extra row/column in the MNA matrix for the
/// branch current. The source enforces: V+ - V- = value(t)
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub waveform: Waveform,
    pub branch: NodeId,
}

impl VoltageSource {
    /// Create a new voltage source.
    pub fn new(name: String, nodes: [NodeId; 2], waveform: Waveform, branch: NodeId) -> Self {
        Self {
            name,
            nodes,
            waveform,
            branch,
        }
    }
}

impl Device for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn branch(&self) -> Option<NodeId> {
        Some(self.branch)
    }

    fn is_voltage_source(&self) -> bool {
        true
    }

    fn load_linear(&self, sys: &mut MnaSystem) {
        let [npos, nneg] = self.nodes;
        let br = self.branch;
        sys.add_to_gl(br, npos, 1.0);
        sys.add_to_gl(br, nneg, -1.0);
        sys.add_to_gl(npos, br, 1.0);
        sys.add_to_gl(nneg, br, -1.0);
    }

    fn load_dc(&self, _sys: &mut MnaSystem, _x: &[f64], rhs: &mut [f64]) {
        MnaSystem::add_to_rhs(rhs, self.branch, self.waveform.dc());
    }

    fn load_tran(&self, _sys: &mut MnaSystem, _x: &[f64], rhs: &mut [f64], time: f64) {
        MnaSystem::add_to_rhs(rhs, self.branch, self.waveform.value(time));
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        MnaSystem::add_to_rhs(rhs, self.branch, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.waveform.next_breakpoint(time)
    }

    fn period(&self) -> Option<f64> {
        self.waveform.period()
    }
}

/// An independent current source.
///
/// Current flows from the positive terminal through the source to the
/// negative terminal. Current sources add directly to the RHS vector.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub nodes: [NodeId; 2], // [positive, negative]
    pub waveform: Waveform,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(name: String, nodes: [NodeId; 2], waveform: Waveform) -> Self {
        Self {
            name,
            nodes,
            waveform,
        }
    }

    fn stamp(&self, rhs: &mut [f64], current: f64) {
        MnaSystem::add_to_rhs(rhs, self.nodes[0], -current);
        MnaSystem::add_to_rhs(rhs, self.nodes[1], current);
    }
}

impl Device for CurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_dc(&self, _sys: &mut MnaSystem, _x: &[f64], rhs: &mut [f64]) {
        self.stamp(rhs, self.waveform.dc());
    }

    fn load_tran(&self, _sys: &mut MnaSystem, _x: &[f64], rhs: &mut [f64], time: f64) {
        self.stamp(rhs, self.waveform.value(time));
    }

    fn load_ac(&self, rhs: &mut [f64]) {
        self.stamp(rhs, 1.0);
    }

    fn breakpoint(&self, time: f64) -> Option<f64> {
        self.waveform.next_breakpoint(time)
    }

    fn period(&self) -> Option<f64> {
        self.waveform.period()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> Waveform {
        match Waveform::parse("step(1,2,1m)") {
            Ok(w) => w,
            Err(e) => panic!("{}", e),
        }
    }

    #[test]
    fn test_voltage_source_stamps() {
        let mut sys = MnaSystem::new(2);
        let v = VoltageSource::new(
            "V1".into(),
            [NodeId::new(0), NodeId::GROUND],
            step(),
            NodeId::new(1),
        );
        v.load_linear(&mut sys);
        assert_eq!(sys.gl[(1, 0)], 1.0);
        assert_eq!(sys.gl[(0, 1)], 1.0);
        assert_eq!(sys.gl[(1, 1)], 0.0);

        let mut rhs = vec![0.0; 2];
        v.load_dc(&mut sys, &[0.0; 2], &mut rhs);
        assert_eq!(rhs, vec![0.0, 1.0]);

        rhs.fill(0.0);
        v.load_tran(&mut sys, &[0.0; 2], &mut rhs, 1.0);
        assert_eq!(rhs[1], 2.0);

        rhs.fill(0.0);
        v.load_ac(&mut rhs);
        assert_eq!(rhs[1], 1.0);

        assert_eq!(v.breakpoint(0.0), Some(1e-3));
        assert_eq!(v.period(), None);
    }

    #[test]
    fn test_current_source_direction() {
        let mut sys = MnaSystem::new(2);
        let i = CurrentSource::new(
            "I1".into(),
            [NodeId::new(0), NodeId::new(1)],
            Waveform::Constant(1e-3),
        );
        let mut rhs = vec![0.0; 2];
        i.load_dc(&mut sys, &[0.0; 2], &mut rhs);
        assert_eq!(rhs, vec![-1e-3, 1e-3]);

        rhs.fill(0.0);
        i.load_ac(&mut rhs);
        assert_eq!(rhs, vec![-1.0, 1.0]);
        assert_eq!(i.branch(), None);
    }
}
