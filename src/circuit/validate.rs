//! Circuit validation.
//!
//! Checks run when a circuit is finalized:
//! - At least one device terminal touches ground
//! - Voltage sources do not form a loop and are not shorted by a wire

use crate::components::Device;
use crate::error::{Result, SimError};
use crate::solver::{Matrix, MnaSystem};

use super::Circuit;

/// Fail with [`SimError::MissingGround`] if nothing connects to ground.
pub fn check_ground(circuit: &Circuit) -> Result<()> {
    if circuit.grounded {
        Ok(())
    } else {
        Err(SimError::MissingGround)
    }
}

/// Fail with [`SimError::VoltageSourceLoop`] if the branch equations of
/// the voltage sources are linearly dependent.
///
/// Each source contributes the row `v(npos) - v(nneg)` of `Gl`. Sources in
/// a loop (or one whose terminals are the same node) make these rows
/// rank-deficient, which would leave the MNA matrix singular.
pub fn check_voltage_source_loops(
    system: &MnaSystem,
    devices: &[Box<dyn Device + Send>],
) -> Result<()> {
    let branches: Vec<usize> = devices
        .iter()
        .filter(|d| d.is_voltage_source())
        .filter_map(|d| d.branch().and_then(|b| b.index()))
        .collect();
    if branches.is_empty() {
        return Ok(());
    }

    let n = system.size();
    let gl = system.linear_conductance();
    let mut rows = Matrix::zeros(branches.len(), n);
    for (r, &br) in branches.iter().enumerate() {
        for c in 0..n {
            rows[(r, c)] = gl[(br, c)];
        }
    }

    if rows.rank() < branches.len() {
        return Err(SimError::VoltageSourceLoop);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::circuit::{Circuit, NodeId};
    use crate::error::SimError;
    use crate::netlist::Waveform;

    #[test]
    fn test_parallel_sources_rejected() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.voltage_source("V2", a, NodeId::GROUND, Waveform::Constant(2.0))
            .unwrap();
        assert!(matches!(ckt.finalize(), Err(SimError::VoltageSourceLoop)));
    }

    #[test]
    fn test_shorted_source_rejected() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 1.0).unwrap();
        ckt.voltage_source("V1", a, a, Waveform::Constant(1.0)).unwrap();
        assert!(matches!(ckt.finalize(), Err(SimError::VoltageSourceLoop)));
    }

    #[test]
    fn test_series_sources_accepted() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let b = ckt.node("b").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.voltage_source("V2", b, a, Waveform::Constant(2.0)).unwrap();
        ckt.resistor("R1", b, NodeId::GROUND, 1.0).unwrap();
        assert!(ckt.finalize().is_ok());
    }
}
