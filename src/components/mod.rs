//! Device models for circuit simulation.
//!
//! This module provides models for all supported devices:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source, Current Source (and the current probe, a
//!   zero-volt voltage source)
//! - Nonlinear: Diode, MOSFET
//! - Controlled: Op-Amp (voltage-controlled voltage source)
//!
//! Each device contributes to the MNA system through the [`Device`] trait.
//! The right-hand side accumulates the negated residual `-f(x)` and the
//! matrices accumulate its Jacobian, so a device that draws current `i`
//! out of node `n` subtracts `i` from `rhs[n]`.

mod diode;
mod linear;
mod mosfet;
mod opamp;
mod sources;

pub use diode::{Diode, DiodeKind};
pub use linear::{Capacitor, Inductor, Resistor};
pub use mosfet::{FetType, Mosfet};
pub use opamp::OpAmp;
pub use sources::{CurrentSource, VoltageSource};

use std::fmt;

use crate::circuit::NodeId;
use crate::solver::MnaSystem;

/// A circuit device.
///
/// Devices hold their terminal and branch indices and parameters only.
/// All global state (matrices, solution, right-hand side) is owned by the
/// circuit and handed in per call.
pub trait Device: fmt::Debug {
    /// Device name as registered with the circuit.
    fn name(&self) -> &str;

    /// Branch-current unknown owned by this device, if any.
    fn branch(&self) -> Option<NodeId> {
        None
    }

    /// Whether this device behaves as an ideal voltage source (its branch
    /// row pins a node voltage difference).
    fn is_voltage_source(&self) -> bool {
        false
    }

    /// Stamp the constant part of the device into `Gl` and `C`.
    /// Called once when the circuit is finalized.
    fn load_linear(&self, _sys: &mut MnaSystem) {}

    /// Stamp the DC companion model at the operating estimate `x`.
    fn load_dc(&self, _sys: &mut MnaSystem, _x: &[f64], _rhs: &mut [f64]) {}

    /// Stamp the companion model at time `time`.
    fn load_tran(&self, sys: &mut MnaSystem, x: &[f64], rhs: &mut [f64], _time: f64) {
        self.load_dc(sys, x, rhs)
    }

    /// Add the small-signal excitation of this device.
    fn load_ac(&self, _rhs: &mut [f64]) {}

    /// Next time after `time` at which this device's excitation has a
    /// corner, if any.
    fn breakpoint(&self, _time: f64) -> Option<f64> {
        None
    }

    /// Repeat period of this device's excitation, if it is periodic.
    fn period(&self) -> Option<f64> {
        None
    }
}
