//! Small-signal AC analysis.
//!
//! The circuit is linearized at its DC operating point and excited by a
//! single named source at unit magnitude. For each frequency the complex
//! system `(G + jωC)(x + jy) = b` is solved as the real system
//!
//! ```text
//! [ G  -ωC ] [ x ]   [ b ]
//! [ ωC   G ] [ y ] = [ 0 ]
//! ```

use std::collections::BTreeMap;
use std::f64::consts::PI;

use log::debug;
use serde::Serialize;

use crate::circuit::Circuit;
use crate::error::{Result, SimError};

use super::dc::load_dc;
use super::matrix::Matrix;

/// Result of an AC sweep.
#[derive(Debug, Clone, Serialize)]
pub struct AcResponse {
    /// Sweep frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Response magnitude of every unknown by name
    pub magnitude: BTreeMap<String, Vec<f64>>,
    /// Response phase in degrees, unwrapped along the sweep
    pub phase: BTreeMap<String, Vec<f64>>,
}

impl AcResponse {
    pub fn magnitude_of(&self, name: &str) -> Option<&[f64]> {
        self.magnitude.get(name).map(Vec::as_slice)
    }

    pub fn phase_of(&self, name: &str) -> Option<&[f64]> {
        self.phase.get(name).map(Vec::as_slice)
    }
}

/// Logarithmic sweep: `f_start * 10^(k / points_per_decade)` up to
/// `f_stop` (with a small allowance for rounding).
fn sweep(points_per_decade: usize, f_start: f64, f_stop: f64) -> Vec<f64> {
    let ratio = 10f64.powf(1.0 / points_per_decade as f64);
    let limit = f_stop * 1.0001;
    let mut frequencies = Vec::new();
    let mut f = f_start;
    while f <= limit {
        frequencies.push(f);
        f *= ratio;
    }
    frequencies
}

/// Shift `phase` by whole turns so it stays within 90 degrees of `previous`.
fn unwrap_phase(previous: f64, mut phase: f64) -> f64 {
    while phase - previous > 90.0 {
        phase -= 360.0;
    }
    while previous - phase > 90.0 {
        phase += 360.0;
    }
    phase
}

impl Circuit {
    /// Sweep the small-signal response to a unit excitation of `source`.
    ///
    /// The DC operating point is computed first if none is stored.
    pub fn ac(
        &mut self,
        points_per_decade: usize,
        f_start: f64,
        f_stop: f64,
        source: &str,
    ) -> Result<AcResponse> {
        let Some(&source_index) = self.device_map.get(source) else {
            return Err(SimError::UnknownSource {
                name: source.to_string(),
            });
        };
        if points_per_decade == 0 {
            return Err(SimError::invalid_param("points per decade must be positive"));
        }
        if !(f_start > 0.0 && f_start.is_finite() && f_stop >= f_start && f_stop.is_finite()) {
            return Err(SimError::invalid_param(format!(
                "frequency range [{}, {}] must be positive and increasing",
                f_start, f_stop
            )));
        }

        self.finalize()?;
        if self.dc_solution.is_none() {
            self.solve_operating_point()?;
        }
        let op = self
            .dc_solution
            .clone()
            .unwrap_or_else(|| vec![0.0; self.size()]);

        // Linearize at the operating point; only the named source excites
        let n = self.size();
        let mut rhs = vec![0.0; n];
        load_dc(&self.devices, &mut self.system, &op, &mut rhs);
        rhs.fill(0.0);
        self.devices[source_index].load_ac(&mut rhs);

        let g = &self.system.g;
        let c = &self.system.c;
        let frequencies = sweep(points_per_decade, f_start, f_stop);
        let mut magnitude: Vec<Vec<f64>> = vec![Vec::with_capacity(frequencies.len()); n];
        let mut phase: Vec<Vec<f64>> = vec![Vec::with_capacity(frequencies.len()); n];
        let mut system = Matrix::zeros(2 * n, 2 * n + 1);

        for &f in &frequencies {
            let omega = 2.0 * PI * f;
            system.clear();
            for i in 0..n {
                for j in 0..n {
                    let gij = g[(i, j)];
                    let cij = omega * c[(i, j)];
                    system[(i, j)] = gij;
                    system[(i, j + n)] = -cij;
                    system[(i + n, j)] = cij;
                    system[(i + n, j + n)] = gij;
                }
                system[(i, 2 * n)] = rhs[i];
            }
            let solution = system.solve_augmented();

            for i in 0..n {
                let (re, im) = (solution.x[i], solution.x[i + n]);
                magnitude[i].push(re.hypot(im));
                let deg = im.atan2(re).to_degrees();
                let deg = match phase[i].last() {
                    Some(&prev) => unwrap_phase(prev, deg),
                    None => deg,
                };
                phase[i].push(deg);
            }
        }

        debug!(
            "AC sweep of '{}': {} frequencies from {:e} to {:e} Hz",
            source,
            frequencies.len(),
            f_start,
            f_stop
        );
        Ok(AcResponse {
            frequencies,
            magnitude: self.labels.iter().cloned().zip(magnitude).collect(),
            phase: self.labels.iter().cloned().zip(phase).collect(),
        })
    }
}
