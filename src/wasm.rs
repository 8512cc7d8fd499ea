//! WASM bindings for cktsim.
//!
//! This module provides JavaScript-friendly bindings so a browser-based
//! schematic editor can hand over its netlist and read results back as
//! JSON.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuit } from 'cktsim';
//!
//! await init();
//!
//! const netlist = [
//!   ["v", [0, 0, 0], {name: "V1", value: "sin(0,1,1k)"}, ["in", "0"]],
//!   ["r", [0, 0, 0], {name: "R1", r: "1k"}, ["in", "out"]],
//!   ["c", [0, 0, 0], {name: "C1", c: "100n"}, ["out", "0"]],
//! ];
//!
//! const ckt = new WasmCircuit(JSON.stringify(netlist));
//! const tran = JSON.parse(ckt.tran(500, 0, 5e-3, false));
//! const ac = JSON.parse(ckt.ac(20, 10, 1e6, "V1"));
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::circuit::Circuit;
use crate::error::Result;
use crate::solver::IntegrationMethod;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js<T: Serialize>(result: Result<T>) -> std::result::Result<String, JsValue> {
    result
        .and_then(|value| Ok(serde_json::to_string(&value)?))
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// WASM-compatible circuit.
///
/// Wraps a [`Circuit`] loaded from a JSON netlist. Every analysis returns
/// its result as a JSON string and throws the error message on failure.
#[wasm_bindgen]
pub struct WasmCircuit {
    circuit: Circuit,
}

#[wasm_bindgen]
impl WasmCircuit {
    /// Load a circuit from netlist JSON.
    ///
    /// # Example
    /// ```javascript
    /// const ckt = new WasmCircuit(JSON.stringify(netlist));
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(netlist_json: &str) -> std::result::Result<WasmCircuit, JsValue> {
        let circuit =
            Circuit::from_netlist_json(netlist_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmCircuit { circuit })
    }

    /// Select the transient integration method (`"be"` or `"trap"`).
    #[wasm_bindgen]
    pub fn set_method(&mut self, method: &str) -> std::result::Result<(), JsValue> {
        let method = IntegrationMethod::from_name(method)
            .ok_or_else(|| JsValue::from_str(&format!("unknown integration method '{}'", method)))?;
        let config = self.circuit.config().clone().with_integration(method);
        self.circuit.set_config(config);
        Ok(())
    }

    /// DC operating point as `{"values": {...}, "iterations": n, "floating": [...]}`.
    #[wasm_bindgen]
    pub fn dc(&mut self) -> std::result::Result<String, JsValue> {
        to_js(self.circuit.dc())
    }

    /// Transient analysis as `{"time": [...], "signals": {...}}`.
    #[wasm_bindgen]
    pub fn tran(
        &mut self,
        sample_count: usize,
        t_start: f64,
        t_stop: f64,
        skip_dc: bool,
    ) -> std::result::Result<String, JsValue> {
        to_js(self.circuit.tran(sample_count, t_start, t_stop, skip_dc))
    }

    /// AC sweep as `{"frequencies": [...], "magnitude": {...}, "phase": {...}}`.
    #[wasm_bindgen]
    pub fn ac(
        &mut self,
        points_per_decade: usize,
        f_start: f64,
        f_stop: f64,
        source: &str,
    ) -> std::result::Result<String, JsValue> {
        to_js(self.circuit.ac(points_per_decade, f_start, f_stop, source))
    }

    /// Names of all node voltages and branch currents.
    #[wasm_bindgen]
    pub fn signal_names(&self) -> Vec<String> {
        self.circuit.labels().to_vec()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
