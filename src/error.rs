//! Error types for the cktsim circuit simulator.
//!
//! This module provides a unified error type [`SimError`] that covers
//! all error conditions that can occur during netlist loading, circuit
//! assembly, and analysis.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type for all cktsim operations.
#[derive(Error, Debug)]
pub enum SimError {
    // ============ Netlist Errors ============
    /// The netlist is not valid JSON
    #[error("Netlist is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A netlist record does not have the `[type, view, properties, nodes]` shape
    #[error("Malformed netlist record {index}: {message}")]
    MalformedRecord { index: usize, message: String },

    /// Unknown component type
    #[error("Unknown component type '{component_type}' in netlist record {index}")]
    UnknownComponentType { component_type: String, index: usize },

    /// A required property is absent
    #[error("Component '{component}' is missing property '{property}'")]
    MissingProperty { component: String, property: String },

    /// A property could not be interpreted as a number
    #[error("Value '{text}' of '{property}' on '{component}' is not a number (engineering notation such as 4.7k is accepted, expressions are not)")]
    InvalidValue {
        component: String,
        property: String,
        text: String,
    },

    /// A source waveform descriptor could not be parsed
    #[error("Invalid source description '{text}': {message}")]
    InvalidSource { text: String, message: String },

    /// A component is connected to the wrong number of nodes
    #[error("Component '{component}' needs {expected} terminals, got {got}")]
    WrongTerminalCount {
        component: String,
        expected: usize,
        got: usize,
    },

    /// No device terminal touches ground
    #[error("Circuit has no connection to ground (use node '0' or a ground symbol)")]
    MissingGround,

    // ============ Topology Errors ============
    /// Registration attempted after the unknown count was frozen
    #[error("Circuit is already finalized; '{what}' cannot be added")]
    CircuitFinalized { what: String },

    /// Voltage sources form a loop or are shorted by a wire
    #[error("Circuit has a voltage source loop or a source shorted by a wire")]
    VoltageSourceLoop,

    // ============ Simulation Errors ============
    /// DC Newton-Raphson iteration did not converge
    #[error("DC analysis did not converge after {iterations} iterations: unknown '{unknown}' did not settle ({hint})")]
    DcNonConvergence {
        unknown: String,
        iterations: usize,
        hint: String,
    },

    /// A transient time step did not converge
    #[error("Transient analysis failed to converge at t = {time:.3e}s after {iterations} iterations (unknown '{unknown}'); try a finer time grid")]
    TransientNonConvergence {
        time: f64,
        iterations: usize,
        unknown: String,
    },

    /// AC analysis names a source that does not exist
    #[error("AC analysis refers to unknown source '{name}'")]
    UnknownSource { name: String },

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SimError {
    /// Create a malformed record error
    pub fn malformed(index: usize, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            message: message.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(
        component: impl Into<String>,
        property: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            component: component.into(),
            property: property.into(),
            text: text.into(),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            text: text.into(),
            message: message.into(),
        }
    }

    /// Create an invalid simulation parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::InvalidSimulationParam {
            message: message.into(),
        }
    }
}
