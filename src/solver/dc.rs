//! DC operating-point analysis.

use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

use crate::circuit::Circuit;
use crate::components::Device;
use crate::error::{Result, SimError};

use super::mna::MnaSystem;
use super::newton::NewtonRaphson;

/// Result of a DC analysis.
#[derive(Debug, Clone, Serialize)]
pub struct DcSolution {
    /// Every node voltage by name (ground names read 0) and every branch
    /// current as `I(<device>)`
    pub values: BTreeMap<String, f64>,
    /// Newton iterations used
    pub iterations: usize,
    /// Unknowns with no conductive path that needed a synthetic pivot
    pub floating: Vec<String>,
}

impl DcSolution {
    /// Look up a node voltage or branch current by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Load `-f(x)` into `rhs` and the DC Jacobian into the system matrix.
///
///   rhs = -Gl x + sum(device.load_dc)
///   G   =  Gl   + sum(nonlinear linearizations)
pub(crate) fn load_dc(
    devices: &[Box<dyn Device + Send>],
    sys: &mut MnaSystem,
    x: &[f64],
    rhs: &mut [f64],
) {
    sys.gl.mul_vec_into(x, rhs, -1.0);
    sys.gl.copy_into(&mut sys.g);
    for device in devices {
        device.load_dc(sys, x, rhs);
    }
    sys.g.copy_into(&mut sys.matrix);
}

impl Circuit {
    /// Compute the DC operating point.
    ///
    /// Finalizes the circuit if needed. On success the operating point is
    /// stored and later seeds transient analysis and linearizes AC
    /// analysis.
    pub fn dc(&mut self) -> Result<DcSolution> {
        self.finalize()?;
        let (iterations, patched) = self.solve_operating_point()?;

        let floating: Vec<String> = patched.iter().map(|&i| self.labels[i].clone()).collect();
        for name in &floating {
            warn!("'{}' has no conductive path; its value is not meaningful", name);
        }

        debug!("DC converged in {} iterations", iterations);
        Ok(DcSolution {
            values: self.named_values(&self.state.solution),
            iterations,
            floating,
        })
    }

    /// Run the DC Newton loop from the current solution and store the
    /// operating point. Returns the iteration count and the patched
    /// columns of the final solve.
    pub(crate) fn solve_operating_point(&mut self) -> Result<(usize, Vec<usize>)> {
        let mut newton = NewtonRaphson::new(&self.config, self.config.dc_max_iterations);
        let devices = &self.devices;
        let result = newton.solve(&mut self.state, &mut self.system, |sys, x, rhs| {
            load_dc(devices, sys, x, rhs)
        });

        match result {
            Ok(iterations) => {
                self.dc_solution = Some(self.state.solution.clone());
                Ok((iterations, newton.patched().to_vec()))
            }
            Err(failure) => {
                self.dc_solution = None;
                let hint = if self.current_sources > 0 {
                    "check that current sources have a conductive path to ground"
                } else {
                    "the circuit may have no stable operating point"
                };
                Err(SimError::DcNonConvergence {
                    unknown: self.labels[failure.unknown].clone(),
                    iterations: failure.iterations,
                    hint: hint.to_string(),
                })
            }
        }
    }
}
