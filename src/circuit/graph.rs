//! Circuit structure: unknown numbering, device list and persistent state.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use super::types::{NodeId, UnknownKind};
use super::validate;
use crate::components::{
    Capacitor, CurrentSource, Device, Diode, DiodeKind, FetType, Inductor, Mosfet, OpAmp,
    Resistor, VoltageSource,
};
use crate::error::{Result, SimError};
use crate::netlist::Waveform;
use crate::solver::{MnaSystem, SimulatorConfig, SolverState};

/// A circuit under construction or ready for analysis.
///
/// Nodes and devices are registered first; [`Circuit::finalize`] then
/// freezes the unknown count, allocates the MNA matrices and loads every
/// linear stamp. The analyses in [`crate::solver`] finalize on demand.
#[derive(Debug)]
pub struct Circuit {
    /// Mapping from node names to unknowns (ground names map to GROUND)
    pub(crate) node_map: HashMap<String, NodeId>,

    /// Kind of each unknown
    pub(crate) kinds: Vec<UnknownKind>,

    /// Display name of each unknown: node name or `I(<device>)`
    pub(crate) labels: Vec<String>,

    /// All devices in registration order
    pub(crate) devices: Vec<Box<dyn Device + Send>>,

    /// Device name to index in `devices` (later registrations win)
    pub(crate) device_map: HashMap<String, usize>,

    /// Number of independent current sources
    pub(crate) current_sources: usize,

    /// Whether any device terminal touches ground
    pub(crate) grounded: bool,

    pub(crate) finalized: bool,

    /// Matrices, sized at finalize
    pub(crate) system: MnaSystem,

    /// Per-unknown vectors, sized at finalize
    pub(crate) state: SolverState,

    /// Operating point from the last successful DC analysis
    pub(crate) dc_solution: Option<Vec<f64>>,

    pub(crate) config: SimulatorConfig,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Create an empty circuit with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create an empty circuit with a custom configuration.
    pub fn with_config(config: SimulatorConfig) -> Self {
        let mut node_map = HashMap::new();
        node_map.insert("0".to_string(), NodeId::GROUND);
        Self {
            node_map,
            kinds: Vec::new(),
            labels: Vec::new(),
            devices: Vec::new(),
            device_map: HashMap::new(),
            current_sources: 0,
            grounded: false,
            finalized: false,
            system: MnaSystem::new(0),
            state: SolverState::default(),
            dc_solution: None,
            config,
        }
    }

    /// Get the simulator configuration.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Replace the simulator configuration.
    ///
    /// Tolerances take effect on the next analysis.
    pub fn set_config(&mut self, config: SimulatorConfig) {
        if self.finalized {
            self.state = SolverState::new(&self.kinds, &config);
            if let Some(op) = &self.dc_solution {
                self.state.solution.copy_from_slice(op);
            }
        }
        self.config = config;
    }

    // ============ Registration ============

    fn check_open(&self, what: &str) -> Result<()> {
        if self.finalized {
            return Err(SimError::CircuitFinalized {
                what: what.to_string(),
            });
        }
        Ok(())
    }

    fn new_unknown(&mut self, kind: UnknownKind, label: String) -> NodeId {
        let id = NodeId::new(self.kinds.len());
        self.kinds.push(kind);
        self.labels.push(label);
        id
    }

    /// Get the unknown for a named node, creating it if needed.
    ///
    /// `"0"` and any name registered with [`Circuit::ground_alias`] resolve
    /// to ground.
    pub fn node(&mut self, name: &str) -> Result<NodeId> {
        if let Some(&id) = self.node_map.get(name) {
            return Ok(id);
        }
        self.check_open(name)?;
        let id = self.new_unknown(UnknownKind::Voltage, name.to_string());
        self.node_map.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declare `name` to be another name for ground.
    pub fn ground_alias(&mut self, name: &str) -> Result<()> {
        self.check_open(name)?;
        self.node_map.insert(name.to_string(), NodeId::GROUND);
        Ok(())
    }

    /// Allocate a branch-current unknown for device `name`.
    fn branch(&mut self, name: &str) -> Result<NodeId> {
        self.check_open(name)?;
        Ok(self.new_unknown(UnknownKind::Current, format!("I({})", name)))
    }

    /// Add a device to the circuit.
    ///
    /// `terminals` lists the nodes the device connects to; they are only
    /// used to track whether the circuit touches ground.
    pub fn add_device(&mut self, device: Box<dyn Device + Send>, terminals: &[NodeId]) -> Result<()> {
        self.check_open(device.name())?;
        if terminals.iter().any(NodeId::is_ground) {
            self.grounded = true;
        }

        let name = device.name().to_string();
        let index = self.devices.len();
        self.devices.push(device);
        if !name.is_empty() && self.device_map.insert(name.clone(), index).is_some() {
            warn!("two circuit elements share the name '{}'; the later one wins", name);
        }
        Ok(())
    }

    /// Add a resistor. Zero resistance becomes a zero-volt voltage source.
    pub fn resistor(&mut self, name: &str, n1: NodeId, n2: NodeId, resistance: f64) -> Result<()> {
        if resistance == 0.0 {
            return self.voltage_source(name, n1, n2, Waveform::Constant(0.0));
        }
        let r = Resistor::new(name.to_string(), [n1, n2], resistance);
        self.add_device(Box::new(r), &[n1, n2])
    }

    /// Add a capacitor.
    pub fn capacitor(&mut self, name: &str, n1: NodeId, n2: NodeId, capacitance: f64) -> Result<()> {
        let c = Capacitor::new(name.to_string(), [n1, n2], capacitance);
        self.add_device(Box::new(c), &[n1, n2])
    }

    /// Add an inductor.
    pub fn inductor(&mut self, name: &str, n1: NodeId, n2: NodeId, inductance: f64) -> Result<()> {
        let branch = self.branch(name)?;
        let l = Inductor::new(name.to_string(), [n1, n2], inductance, branch);
        self.add_device(Box::new(l), &[n1, n2])
    }

    /// Add a diode. Zero-area diodes are discarded.
    pub fn diode(
        &mut self,
        name: &str,
        anode: NodeId,
        cathode: NodeId,
        area: f64,
        kind: DiodeKind,
    ) -> Result<()> {
        self.check_open(name)?;
        if area == 0.0 {
            warn!("diode '{}' has zero area and is ignored", name);
            return Ok(());
        }
        let d = Diode::new(name.to_string(), [anode, cathode], area, kind);
        self.add_device(Box::new(d), &[anode, cathode])
    }

    /// Add an independent voltage source.
    pub fn voltage_source(
        &mut self,
        name: &str,
        npos: NodeId,
        nneg: NodeId,
        waveform: Waveform,
    ) -> Result<()> {
        let branch = self.branch(name)?;
        let v = VoltageSource::new(name.to_string(), [npos, nneg], waveform, branch);
        self.add_device(Box::new(v), &[npos, nneg])
    }

    /// Add an independent current source (current flows from `npos`
    /// through the source to `nneg`).
    pub fn current_source(
        &mut self,
        name: &str,
        npos: NodeId,
        nneg: NodeId,
        waveform: Waveform,
    ) -> Result<()> {
        let i = CurrentSource::new(name.to_string(), [npos, nneg], waveform);
        self.add_device(Box::new(i), &[npos, nneg])?;
        self.current_sources += 1;
        Ok(())
    }

    /// Add a current probe: a zero-volt source reporting `I(name)`.
    pub fn current_probe(&mut self, name: &str, n1: NodeId, n2: NodeId) -> Result<()> {
        self.voltage_source(name, n1, n2, Waveform::Constant(0.0))
    }

    /// Add an op-amp with inputs `np`/`nn`, output `no` referenced to `ng`.
    pub fn opamp(
        &mut self,
        name: &str,
        [np, nn, no, ng]: [NodeId; 4],
        gain: f64,
    ) -> Result<()> {
        let branch = self.branch(name)?;
        let op = OpAmp::new(name.to_string(), [np, nn, no, ng], gain, branch);
        self.add_device(Box::new(op), &[np, nn, no, ng])
    }

    /// Add a MOSFET with terminals `[drain, gate, source]`.
    pub fn mosfet(
        &mut self,
        name: &str,
        [d, g, s]: [NodeId; 3],
        fet_type: FetType,
        ratio: f64,
    ) -> Result<()> {
        let m = Mosfet::new(name.to_string(), [d, g, s], fet_type, ratio);
        self.add_device(Box::new(m), &[d, g, s])
    }

    // ============ Finalize ============

    /// Freeze the topology, allocate matrices and load linear stamps.
    ///
    /// Calling this again is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        validate::check_ground(self)?;

        let n = self.kinds.len();
        let mut system = MnaSystem::new(n);
        for device in &self.devices {
            device.load_linear(&mut system);
        }
        validate::check_voltage_source_loops(&system, &self.devices)?;

        self.system = system;
        self.state = SolverState::new(&self.kinds, &self.config);
        self.finalized = true;

        debug!(
            "finalized circuit: {} unknowns ({} nodes, {} branches), {} devices",
            n,
            self.kinds.iter().filter(|k| **k == UnknownKind::Voltage).count(),
            self.kinds.iter().filter(|k| **k == UnknownKind::Current).count(),
            self.devices.len()
        );
        Ok(())
    }

    // ============ Accessors ============

    /// Whether the circuit has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of unknowns (node voltages plus branch currents).
    pub fn size(&self) -> usize {
        self.kinds.len()
    }

    /// Find a node by name.
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.node_map.get(name).copied()
    }

    /// Display name of an unknown.
    pub fn label(&self, id: NodeId) -> &str {
        id.index().map_or("0", |i| &self.labels[i])
    }

    /// Display names of all unknowns, in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Kind of each unknown, in index order.
    pub fn kinds(&self) -> &[UnknownKind] {
        &self.kinds
    }

    /// Find a device by name.
    pub fn device(&self, name: &str) -> Option<&dyn Device> {
        self.device_map
            .get(name)
            .map(|&i| self.devices[i].as_ref() as &dyn Device)
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// The MNA matrices (empty before finalize).
    pub fn system(&self) -> &MnaSystem {
        &self.system
    }

    /// The stored DC operating point, if DC analysis has succeeded.
    pub fn operating_point(&self) -> Option<&[f64]> {
        self.dc_solution.as_deref()
    }

    /// Named values of a solution vector: every unknown by label plus
    /// every ground name at zero.
    pub(crate) fn named_values(&self, x: &[f64]) -> BTreeMap<String, f64> {
        let mut values: BTreeMap<String, f64> = self
            .labels
            .iter()
            .cloned()
            .zip(x.iter().copied())
            .collect();
        for (name, id) in &self.node_map {
            if id.is_ground() {
                values.insert(name.clone(), 0.0);
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_numbering() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let b = ckt.node("b").unwrap();
        assert_eq!(ckt.node("a").unwrap(), a);
        assert_eq!(ckt.node("0").unwrap(), NodeId::GROUND);

        ckt.voltage_source("V1", a, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.resistor("R1", a, b, 1e3).unwrap();

        assert_eq!(a.index(), Some(0));
        assert_eq!(b.index(), Some(1));
        assert_eq!(ckt.labels(), &["a", "b", "I(V1)"]);
        assert_eq!(ckt.kinds()[2], UnknownKind::Current);
        assert_eq!(ckt.size(), 3);
    }

    #[test]
    fn test_zero_resistor_becomes_source() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.resistor("R0", a, NodeId::GROUND, 0.0).unwrap();
        assert_eq!(ckt.labels(), &["a", "I(R0)"]);
        assert!(ckt.device("R0").is_some_and(|d| d.is_voltage_source()));
    }

    #[test]
    fn test_zero_area_diode_discarded() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.diode("D1", a, NodeId::GROUND, 0.0, DiodeKind::Normal)
            .unwrap();
        assert_eq!(ckt.device_count(), 0);
    }

    #[test]
    fn test_duplicate_name_later_wins() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.resistor("X", a, NodeId::GROUND, 1.0).unwrap();
        ckt.capacitor("X", a, NodeId::GROUND, 1.0).unwrap();
        assert_eq!(ckt.device_count(), 2);
        assert_eq!(ckt.device_map.get("X"), Some(&1));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 100.0).unwrap();
        ckt.finalize().unwrap();
        let before = ckt.system().linear_conductance().clone();
        ckt.finalize().unwrap();
        assert_eq!(ckt.system().linear_conductance(), &before);
        assert_eq!(ckt.device_count(), 1);
        assert_eq!(before[(0, 0)], 0.01);
    }

    #[test]
    fn test_registration_after_finalize_rejected() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 100.0).unwrap();
        ckt.finalize().unwrap();

        assert!(matches!(
            ckt.node("new"),
            Err(SimError::CircuitFinalized { .. })
        ));
        assert!(matches!(
            ckt.resistor("R2", a, NodeId::GROUND, 1.0),
            Err(SimError::CircuitFinalized { .. })
        ));
        // Existing names still resolve
        assert_eq!(ckt.node("a").unwrap(), a);
    }

    #[test]
    fn test_missing_ground() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let b = ckt.node("b").unwrap();
        ckt.resistor("R1", a, b, 1.0).unwrap();
        assert!(matches!(ckt.finalize(), Err(SimError::MissingGround)));
        assert!(!ckt.is_finalized());
    }

    #[test]
    fn test_named_values_include_ground() {
        let mut ckt = Circuit::new();
        ckt.ground_alias("gnd").unwrap();
        let a = ckt.node("a").unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 1.0).unwrap();
        let values = ckt.named_values(&[2.5]);
        assert_eq!(values.get("a"), Some(&2.5));
        assert_eq!(values.get("gnd"), Some(&0.0));
        assert_eq!(values.get("0"), Some(&0.0));
    }
}
