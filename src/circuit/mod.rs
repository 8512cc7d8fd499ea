//! Circuit representation and validation.
//!
//! The [`Circuit`] struct holds all devices, the node and branch unknowns
//! they connect to, and the matrices and state vectors the analyses work
//! on.

mod graph;
mod types;
mod validate;

pub use graph::Circuit;
pub use types::*;
pub use validate::{check_ground, check_voltage_source_loops};
