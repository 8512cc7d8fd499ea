//! Netlist loading.
//!
//! The schematic editor hands the simulator a JSON array of records, one
//! per schematic element:
//!
//! ```text
//! [type, view, properties, nodes]
//! ```
//!
//! | Type | Device | Properties | Nodes |
//! |------|--------|------------|-------|
//! | r | Resistor | `r` | `n1 n2` |
//! | c | Capacitor | `c` | `n1 n2` |
//! | l | Inductor | `l` | `n1 n2` |
//! | d | Diode | `area` (1), `type` (`normal`/`ideal`) | `anode cathode` |
//! | v | Voltage source | `value` (waveform) | `n+ n-` |
//! | i | Current source | `value` (waveform) | `n+ n-` |
//! | o | Op-amp | `A` | `in+ in- out gnd` |
//! | n, p | N/P MOSFET | `W/L` | `d g s` |
//! | a | Current probe | | `n1 n2` |
//! | g | Ground symbol | | `node` |
//!
//! `view`, `w` (wires), `s` (scope probes) and `L` (labels) are ignored.
//! Node `"0"` is always ground.
//!
//! # Example
//!
//! ```text
//! [
//!   ["v", [0, 0, 0], {"name": "V1", "value": "dc(10)"}, ["in", "0"]],
//!   ["r", [0, 0, 0], {"name": "R1", "r": "1k"}, ["in", "out"]],
//!   ["r", [0, 0, 0], {"name": "R2", "r": "1k"}, ["out", "0"]]
//! ]
//! ```

pub mod record;
pub mod value;
pub mod waveform;

pub use record::Record;
pub use value::{parse_number, parse_number_or};
pub use waveform::Waveform;

use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::circuit::{check_ground, Circuit, NodeId};
use crate::components::{DiodeKind, FetType};
use crate::error::{Result, SimError};
use crate::solver::SimulatorConfig;

impl Circuit {
    /// Build a circuit from netlist JSON text.
    pub fn from_netlist_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_netlist(&value)
    }

    /// Build a circuit from a parsed netlist.
    pub fn from_netlist(netlist: &Value) -> Result<Self> {
        Self::from_netlist_with_config(netlist, SimulatorConfig::default())
    }

    /// Build a circuit from a parsed netlist with a custom configuration.
    pub fn from_netlist_with_config(netlist: &Value, config: SimulatorConfig) -> Result<Self> {
        let entries = netlist
            .as_array()
            .ok_or_else(|| SimError::malformed(0, "netlist is not an array"))?;
        let records = entries
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Record::parse(i, v).transpose())
            .collect::<Result<Vec<_>>>()?;

        let mut circuit = Circuit::with_config(config);

        // Ground symbols first, so every later reference resolves to ground
        for rec in records.iter().filter(|r| r.kind == "g") {
            if let Some(node) = rec.nodes.first() {
                circuit.ground_alias(node)?;
            }
        }
        for rec in records.iter().filter(|r| r.kind != "g") {
            add_record(&mut circuit, rec)?;
        }

        check_ground(&circuit)?;
        debug!(
            "loaded netlist: {} records, {} devices, {} unknowns",
            entries.len(),
            circuit.device_count(),
            circuit.size()
        );
        Ok(circuit)
    }

    /// Read and load a netlist file.
    pub fn load_netlist(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SimError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_netlist_json(&content)
    }
}

/// Expected node count for each device type.
fn terminal_count(kind: &str) -> Option<usize> {
    match kind {
        "r" | "c" | "l" | "d" | "v" | "i" | "a" => Some(2),
        "n" | "p" => Some(3),
        "o" => Some(4),
        _ => None,
    }
}

fn source_waveform(rec: &Record) -> Result<Waveform> {
    match rec.properties.get("value") {
        Some(Value::Number(n)) => Ok(Waveform::Constant(n.as_f64().unwrap_or(0.0))),
        Some(Value::String(s)) => Waveform::parse(s),
        Some(Value::Null) | None => Err(SimError::MissingProperty {
            component: rec.name(),
            property: "value".to_string(),
        }),
        Some(other) => Err(SimError::invalid_source(other.to_string(), "expected a string")),
    }
}

fn add_record(circuit: &mut Circuit, rec: &Record) -> Result<()> {
    let unknown_type = || SimError::UnknownComponentType {
        component_type: rec.kind.clone(),
        index: rec.index,
    };
    let expected = terminal_count(&rec.kind).ok_or_else(unknown_type)?;
    rec.expect_nodes(expected)?;

    let nodes = rec
        .nodes
        .iter()
        .map(|n| circuit.node(n))
        .collect::<Result<Vec<NodeId>>>()?;
    let name = rec.name();

    match rec.kind.as_str() {
        "r" => circuit.resistor(&name, nodes[0], nodes[1], rec.number("r")?),
        "c" => circuit.capacitor(&name, nodes[0], nodes[1], rec.number("c")?),
        "l" => circuit.inductor(&name, nodes[0], nodes[1], rec.number("l")?),
        "d" => {
            let area = rec.number_or("area", 1.0)?;
            let kind = rec
                .text("type")
                .map_or(DiodeKind::Normal, |t| DiodeKind::from_name(&t));
            circuit.diode(&name, nodes[0], nodes[1], area, kind)
        }
        "v" => circuit.voltage_source(&name, nodes[0], nodes[1], source_waveform(rec)?),
        "i" => circuit.current_source(&name, nodes[0], nodes[1], source_waveform(rec)?),
        "a" => circuit.current_probe(&name, nodes[0], nodes[1]),
        "o" => circuit.opamp(
            &name,
            [nodes[0], nodes[1], nodes[2], nodes[3]],
            rec.number("A")?,
        ),
        "n" | "p" => {
            let fet_type = if rec.kind == "n" { FetType::N } else { FetType::P };
            circuit.mosfet(&name, [nodes[0], nodes[1], nodes[2]], fet_type, rec.number("W/L")?)
        }
        _ => Err(unknown_type()),
    }
}
