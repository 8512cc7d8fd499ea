//! # cktsim
//!
//! A circuit simulator built on Modified Nodal Analysis.
//!
//! This library provides:
//! - A loader for JSON netlists produced by a schematic editor
//! - Linear devices (R, C, L), independent sources with time-varying
//!   waveforms, diodes, MOSFETs and op-amps
//! - DC operating point, transient and small-signal AC analyses
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`netlist`] - Netlist records, numeric literals and source waveforms
//! - [`circuit`] - Unknown numbering, device list and validation
//! - [`components`] - Device models and their MNA stamps
//! - [`solver`] - Matrices, Newton-Raphson and the analysis drivers
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! cktsim divider.json dc
//! cktsim rc.json tran --samples 1000 --stop 5m
//! RUST_LOG=debug cktsim filter.json ac --points 20 --fstart 1 --fstop 1meg --source VIN
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use cktsim::Circuit;
//!
//! let netlist = r#"[
//!     ["v", [], {"name": "V1", "value": "10"}, ["in", "0"]],
//!     ["r", [], {"name": "R1", "r": "1k"}, ["in", "out"]],
//!     ["r", [], {"name": "R2", "r": "1k"}, ["out", "0"]]
//! ]"#;
//! let mut circuit = Circuit::from_netlist_json(netlist)?;
//! let dc = circuit.dc()?;
//! assert!((dc.get("out").unwrap() - 5.0).abs() < 1e-6);
//! # Ok::<(), cktsim::SimError>(())
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmCircuit } from 'cktsim';
//!
//! const ckt = new WasmCircuit(JSON.stringify(netlist));
//! const op = JSON.parse(ckt.dc());
//! ```
//!
//! ## Simulation Method
//!
//! Every analysis solves `J Δx = -f(x)` by Newton-Raphson, where `f` is the
//! vector of KCL residuals at each node plus the branch equations of
//! voltage sources, inductors and op-amps. Linear stamps are loaded once
//! when the circuit is finalized; nonlinear devices re-linearize on every
//! iteration.
//!
//! Transient analysis integrates the reactive charge `q = C x` with
//! backward Euler (or trapezoidal, see [`solver::IntegrationMethod`]).
//! AC analysis linearizes at the DC operating point and solves the complex
//! system as a real system of twice the size.

pub mod circuit;
pub mod components;
pub mod error;
pub mod netlist;
pub mod solver;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, SimError};
pub use netlist::Waveform;
pub use solver::{AcResponse, DcSolution, IntegrationMethod, SimulatorConfig, TransientResponse};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuit;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
