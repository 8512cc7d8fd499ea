//! Transient (time-domain) analysis.
//!
//! Reactive elements enter through their charge `q = C x`. Each step
//! solves, with Newton iteration,
//!
//! ```text
//! backward Euler:  rhs = c + α0 (q_old - q)               J = G + α0 C
//! trapezoidal:     rhs = β0 c + β1 c_old + α0 (q_old - q)  J = β0 G + α0 C
//! ```
//!
//! where `α0 = 1/Δt` and `c = -Gl x + Σ load_tran` is the resistive
//! residual. The trapezoidal rule averages `c` over the step on rows that
//! carry a derivative (`β0 = β1 = 1/2`) and keeps algebraic rows exact
//! (`β0 = 1, β1 = 0`). The first step, and any step shorter than
//! `1e-4` of the run, uses backward Euler.
//!
//! The largest step is the run length divided by `sample_count` times the
//! number of source periods it spans, so a periodic source is sampled
//! `sample_count` times per period. Within that bound the step adapts to
//! the local truncation error, measured on the rows that carry a
//! derivative against a quadratic through the last three accepted points.
//! Steps are shortened to land exactly on source breakpoints and on the
//! stop time. A step whose Newton iteration fails is retried at a quarter
//! of its length before the analysis gives up.

use std::collections::{BTreeMap, VecDeque};

use log::{debug, warn};
use serde::Serialize;

use crate::circuit::Circuit;
use crate::components::Device;
use crate::error::{Result, SimError};

use super::config::IntegrationMethod;
use super::matrix::Matrix;
use super::mna::MnaSystem;
use super::newton::{NewtonRaphson, SolverState};

/// Step shrink factor after a Newton failure.
const NR_STEP_DECREASE: f64 = 4.0;

/// Largest shrink factor applied on truncation error.
const LTE_STEP_DECREASE: f64 = 8.0;

/// Largest growth factor from one step to the next.
const TIME_STEP_INCREASE: f64 = 2.0;

/// Allowed truncation error, in units of the Newton tolerance.
const LTE_REL: f64 = 10.0;

/// Smallest step, relative to the largest step.
const MIN_STEP_RATIO: f64 = 1e-8;

/// First step, relative to the largest step.
const FIRST_STEP_RATIO: f64 = 1e-6;

/// Steps shorter than this fraction of the run use backward Euler.
const BE_STEP_RATIO: f64 = 1e-4;

/// Accepted steps allowed per source period.
const MAX_STEPS_PER_PERIOD: usize = 50_000;

/// Result of a transient analysis.
#[derive(Debug, Clone, Serialize)]
pub struct TransientResponse {
    /// Time points, starting at `t_start` and ending at `t_stop`
    pub time: Vec<f64>,
    /// Waveform of every node voltage and branch current by name
    pub signals: BTreeMap<String, Vec<f64>>,
}

impl TransientResponse {
    /// Waveform of a node voltage or branch current.
    pub fn signal(&self, name: &str) -> Option<&[f64]> {
        self.signals.get(name).map(Vec::as_slice)
    }

    /// Value of `name` at the time point closest to `t`.
    pub fn value_at(&self, name: &str, t: f64) -> Option<f64> {
        let signal = self.signal(name)?;
        let (index, _) = self
            .time
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - t).abs().total_cmp(&(*b - t).abs()))?;
        signal.get(index).copied()
    }
}

/// Mark the rows of `c` that are algebraic: zeroing them leaves the rank
/// of `c` unchanged.
pub(crate) fn algebraic_rows(c: &Matrix) -> Vec<bool> {
    let n = c.rows();
    let full_rank = c.rank();
    let mut work = c.clone();
    let mut algebraic = vec![false; n];
    for row in 0..n {
        for col in 0..c.cols() {
            work[(row, col)] = 0.0;
        }
        if work.rank() == full_rank {
            algebraic[row] = true;
        } else {
            // Row carries a derivative, put it back
            for col in 0..c.cols() {
                work[(row, col)] = c[(row, col)];
            }
        }
    }
    algebraic
}

/// Earliest source corner after `t`.
///
/// Corners within `min_step` of `t` count as already reached, so the
/// search starts past them.
fn next_breakpoint(devices: &[Box<dyn Device + Send>], t: f64, min_step: f64) -> Option<f64> {
    let from = t + min_step;
    devices
        .iter()
        .filter_map(|d| d.breakpoint(from))
        .filter(|&bp| bp > from)
        .reduce(f64::min)
}

/// Shortest source period, capped at `span`.
fn shortest_period(devices: &[Box<dyn Device + Send>], span: f64) -> f64 {
    devices
        .iter()
        .filter_map(|d| d.period())
        .filter(|&p| p > 0.0)
        .fold(span, f64::min)
}

/// Lagrange weights of the quadratic through `t0, t1, t2`, evaluated at `t`.
fn interp_coeffs(t: f64, t0: f64, t1: f64, t2: f64) -> [f64; 3] {
    let (dt0, dt1, dt2) = (t - t0, t - t1, t - t2);
    let (d01, d02, d12) = (t0 - t1, t0 - t2, t1 - t2);
    [
        dt1 * dt2 / (d01 * d02),
        -dt0 * dt2 / (d01 * d12),
        dt0 * dt1 / (d02 * d12),
    ]
}

/// Time-step controller.
struct StepControl {
    min_step: f64,
    max_step: f64,
    reltol: f64,
}

impl StepControl {
    /// Step to take after the solution in `state` was found at `t` with
    /// step `dt`. `past` holds earlier accepted points, most recent first.
    fn next_step(
        &self,
        t: f64,
        dt: f64,
        past: &VecDeque<(f64, Vec<f64>)>,
        differential: &[bool],
        state: &SolverState,
    ) -> f64 {
        let (Some((t0, x0)), Some((t1, x1)), Some((t2, x2))) = (past.get(0), past.get(1), past.get(2))
        else {
            return (dt * TIME_STEP_INCREASE).min(self.max_step);
        };

        let w = interp_coeffs(t, *t0, *t1, *t2);
        let weight = 0.5 * (t - t0) / (t - t2);
        let mut worst = 0.0f64;
        for i in (0..state.solution.len()).filter(|&i| differential[i]) {
            let predicted = w[0] * x0[i] + w[1] * x1[i] + w[2] * x2[i];
            let lte = (state.solution[i] - predicted).abs() * weight;
            let tolerance = LTE_REL * (state.abstol[i] + self.reltol * state.soln_max[i]);
            worst = worst.max(lte / tolerance);
        }

        // Infinite when nothing was measured
        let ratio = 1.0 / worst.cbrt();
        if ratio < 1.0 {
            let ratio = ratio.max(1.0 / LTE_STEP_DECREASE);
            (dt * 0.75 * ratio).max(self.min_step)
        } else {
            let ratio = ratio.min(TIME_STEP_INCREASE);
            let step = if ratio > 1.2 { dt * ratio / 1.2 } else { dt };
            step.min(self.max_step)
        }
    }
}

/// Resistive residual `c` and charge `q` at `x`. Leaves the resistive
/// Jacobian in `sys.g`.
fn load_residual(
    devices: &[Box<dyn Device + Send>],
    sys: &mut MnaSystem,
    x: &[f64],
    c: &mut [f64],
    q: &mut [f64],
    time: f64,
) {
    sys.gl.mul_vec_into(x, c, -1.0);
    sys.gl.copy_into(&mut sys.g);
    for device in devices {
        device.load_tran(sys, x, c, time);
    }
    sys.c.mul_vec_into(x, q, 1.0);
}

impl Circuit {
    /// Run a transient analysis from `t_start` to `t_stop`.
    ///
    /// `sample_count` sets the largest step: the run is split into
    /// `sample_count` steps per period of the fastest periodic source (or
    /// per run when nothing repeats). Unless `skip_dc` is set, a DC
    /// operating point is computed first if none is stored; if that fails
    /// the analysis starts from zero.
    pub fn tran(
        &mut self,
        sample_count: usize,
        t_start: f64,
        t_stop: f64,
        skip_dc: bool,
    ) -> Result<TransientResponse> {
        if sample_count == 0 {
            return Err(SimError::invalid_param("sample count must be positive"));
        }
        if !(t_start.is_finite() && t_stop.is_finite() && t_stop > t_start) {
            return Err(SimError::invalid_param(format!(
                "stop time {} must be after start time {}",
                t_stop, t_start
            )));
        }
        self.finalize()?;

        if self.dc_solution.is_none() && !skip_dc {
            if let Err(e) = self.solve_operating_point() {
                warn!("{}; starting transient analysis from zero", e);
            }
        }
        let from_operating_point = self.dc_solution.is_some();
        let initial = self
            .dc_solution
            .clone()
            .unwrap_or_else(|| vec![0.0; self.size()]);
        self.state.solution.copy_from_slice(&initial);

        let n = self.size();
        let span = t_stop - t_start;
        let periods = (span / shortest_period(&self.devices, span)).ceil().max(1.0);
        let max_step = span / (periods * sample_count as f64);
        let min_step = max_step * MIN_STEP_RATIO;
        let control = StepControl {
            min_step,
            max_step,
            reltol: self.config.reltol,
        };
        let max_steps = (periods as usize).saturating_mul(MAX_STEPS_PER_PERIOD);
        debug!(
            "transient: {} period(s), max step {:e}, min step {:e}",
            periods, max_step, min_step
        );

        let trapezoidal = self.config.integration == IntegrationMethod::Trapezoidal;
        let algebraic = algebraic_rows(&self.system.c);
        let differential: Vec<bool> = algebraic.iter().map(|a| !a).collect();

        // Resistive residual and charge at the start point
        let mut c = vec![0.0; n];
        let mut q = vec![0.0; n];
        load_residual(
            &self.devices,
            &mut self.system,
            &self.state.solution,
            &mut c,
            &mut q,
            t_start,
        );
        let mut old_c = c.clone();
        let mut old_q = q.clone();

        let mut time = vec![t_start];
        let mut history: Vec<Vec<f64>> = self.state.solution.iter().map(|&v| vec![v]).collect();
        let mut past: VecDeque<(f64, Vec<f64>)> = VecDeque::with_capacity(3);
        past.push_front((t_start, self.state.solution.clone()));

        // Without an operating point the first step has to find one
        let first_budget = if from_operating_point {
            self.config.tran_max_iterations
        } else {
            self.config.dc_max_iterations
        };
        let mut first_newton = NewtonRaphson::new(&self.config, first_budget);
        let mut newton = NewtonRaphson::new(&self.config, self.config.tran_max_iterations);
        let mut beta0 = vec![1.0; n];
        let mut beta1 = vec![0.0; n];
        let mut t = t_start;
        let mut first_step = true;
        let mut next_step = max_step * FIRST_STEP_RATIO;
        let mut saved = self.state.solution.clone();

        while t_stop - t > min_step {
            if time.len() > max_steps {
                warn!(
                    "transient analysis stopped at t = {:e} after {} steps",
                    t,
                    time.len() - 1
                );
                break;
            }

            let mut dt = next_step;
            if let Some(bp) = next_breakpoint(&self.devices, t, min_step) {
                dt = dt.min(bp - t);
            }
            if t + dt > t_stop - min_step {
                dt = t_stop - t;
            } else if t + 1.5 * dt > t_stop {
                dt = (t_stop - t) * 2.0 / 3.0;
            }

            // Retry the step until Newton converges and the error is acceptable
            loop {
                let t_next = t + dt;
                let alpha0 = 1.0 / dt;
                let averaged = trapezoidal && !first_step && dt >= BE_STEP_RATIO * span;
                for i in 0..n {
                    if averaged && !algebraic[i] {
                        beta0[i] = 0.5;
                        beta1[i] = 0.5;
                    } else {
                        beta0[i] = 1.0;
                        beta1[i] = 0.0;
                    }
                }

                let solver = if first_step { &mut first_newton } else { &mut newton };
                let devices = &self.devices;
                let result = solver.solve(&mut self.state, &mut self.system, |sys, x, rhs| {
                    load_residual(devices, sys, x, &mut c, &mut q, t_next);
                    for i in 0..rhs.len() {
                        rhs[i] = beta0[i] * c[i] + beta1[i] * old_c[i] + alpha0 * (old_q[i] - q[i]);
                    }
                    sys.g.row_scaled_add_into(&beta0, &sys.c, alpha0, &mut sys.matrix);
                });

                match result {
                    Ok(_) if dt <= min_step * (1.0 + self.config.reltol) => {
                        next_step = TIME_STEP_INCREASE * min_step;
                        break;
                    }
                    Ok(_) => {
                        let step = control.next_step(t_next, dt, &past, &differential, &self.state);
                        if step < (1.0 - self.config.reltol) * dt {
                            debug!(
                                "step to t = {:.6e} rejected on truncation error, retrying with {:.3e}",
                                t_next, step
                            );
                            self.state.solution.copy_from_slice(&saved);
                            dt = step;
                            continue;
                        }
                        next_step = step;
                        break;
                    }
                    Err(failure) if dt / NR_STEP_DECREASE >= min_step => {
                        debug!(
                            "step to t = {:.6e} failed after {} iterations, shrinking",
                            t_next, failure.iterations
                        );
                        self.state.solution.copy_from_slice(&saved);
                        dt /= NR_STEP_DECREASE;
                    }
                    Err(failure) => {
                        self.state.solution.copy_from_slice(&saved);
                        return Err(SimError::TransientNonConvergence {
                            time: t_next,
                            iterations: failure.iterations,
                            unknown: self.labels[failure.unknown].clone(),
                        });
                    }
                }
            }

            t = if t_stop - (t + dt) <= min_step { t_stop } else { t + dt };
            time.push(t);
            for (signal, &v) in history.iter_mut().zip(&self.state.solution) {
                signal.push(v);
            }

            // Residual and charge at the accepted point seed the next step
            load_residual(
                &self.devices,
                &mut self.system,
                &self.state.solution,
                &mut c,
                &mut q,
                t,
            );
            old_c.copy_from_slice(&c);
            old_q.copy_from_slice(&q);

            if past.len() == 3 {
                past.pop_back();
            }
            past.push_front((t, self.state.solution.clone()));
            saved.copy_from_slice(&self.state.solution);
            first_step = false;
        }

        debug!(
            "transient analysis finished: {} time points over [{:e}, {:e}]",
            time.len(),
            t_start,
            t_stop
        );
        let signals = self.labels.iter().cloned().zip(history).collect();
        Ok(TransientResponse { time, signals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::NodeId;
    use crate::components::VoltageSource;
    use crate::netlist::Waveform;
    use crate::solver::SimulatorConfig;
    use approx::assert_abs_diff_eq;

    fn rc_step(config: SimulatorConfig) -> Circuit {
        let mut ckt = Circuit::with_config(config);
        let vin = ckt.node("in").unwrap();
        let out = ckt.node("out").unwrap();
        let step = Waveform::parse("step(0,1,0,1n)").unwrap();
        ckt.voltage_source("V1", vin, NodeId::GROUND, step).unwrap();
        ckt.resistor("R1", vin, out, 1e3).unwrap();
        ckt.capacitor("C1", out, NodeId::GROUND, 1e-6).unwrap();
        ckt
    }

    #[test]
    fn test_rc_charging_backward_euler() {
        let mut ckt = rc_step(SimulatorConfig::default());
        let tr = ckt.tran(1000, 0.0, 5e-3, false).unwrap();

        assert_eq!(tr.time[0], 0.0);
        assert_abs_diff_eq!(*tr.time.last().unwrap(), 5e-3, epsilon = 1e-15);
        let v_tau = tr.value_at("out", 1e-3).unwrap();
        assert_abs_diff_eq!(v_tau, 0.632, epsilon = 0.02);
        let v_end = *tr.signal("out").unwrap().last().unwrap();
        assert_abs_diff_eq!(v_end, 1.0 - (-5.0f64).exp(), epsilon = 0.02);
    }

    #[test]
    fn test_backward_euler_matches_recurrence() {
        // Each accepted step must follow v' = (v + h/τ) / (1 + h/τ) exactly
        let mut ckt = Circuit::new();
        let vin = ckt.node("in").unwrap();
        let out = ckt.node("out").unwrap();
        ckt.voltage_source("V1", vin, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.resistor("R1", vin, out, 1e3).unwrap();
        ckt.capacitor("C1", out, NodeId::GROUND, 1e-6).unwrap();
        let tr = ckt.tran(100, 0.0, 1e-3, true).unwrap();

        let tau = 1e-3;
        let v = tr.signal("out").unwrap();
        assert_eq!(v[0], 0.0);
        for k in 1..tr.time.len() {
            let h = (tr.time[k] - tr.time[k - 1]) / tau;
            let expected = (v[k - 1] + h) / (1.0 + h);
            assert_abs_diff_eq!(v[k], expected, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(*v.last().unwrap(), 1.0 - (-1.0f64).exp(), epsilon = 0.01);
    }

    #[test]
    fn test_rc_charging_trapezoidal_is_more_accurate() {
        let exact = 1.0 - (-1.0f64).exp();
        let mut be = rc_step(SimulatorConfig::default());
        let mut trap = rc_step(SimulatorConfig::new().with_integration(IntegrationMethod::Trapezoidal));
        let end = |tr: TransientResponse| *tr.signal("out").unwrap().last().unwrap();
        let be_err = (end(be.tran(50, 0.0, 1e-3, false).unwrap()) - exact).abs();
        let trap_err = (end(trap.tran(50, 0.0, 1e-3, false).unwrap()) - exact).abs();
        assert!(trap_err < be_err, "trap {} vs BE {}", trap_err, be_err);
        assert!(trap_err < 2e-3);
    }

    #[test]
    fn test_breakpoints_are_hit() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let src = Waveform::parse("pulse(0,1,0.33m,1u,1u,0.2m,1m)").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, src).unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 1e3).unwrap();
        let tr = ckt.tran(10, 0.0, 1e-3, false).unwrap();

        for corner in [0.33e-3, 0.331e-3, 0.531e-3, 0.532e-3] {
            assert!(
                tr.time.iter().any(|&t| (t - corner).abs() < 1e-12),
                "missing time point {}",
                corner
            );
        }
        assert_abs_diff_eq!(tr.value_at("a", 0.4e-3).unwrap(), 1.0, epsilon = 1e-6);
        assert!(tr.signal("I(V1)").is_some());
    }

    #[test]
    fn test_breakpoint_just_ahead_is_skipped() {
        let src = Waveform::parse("pwl(0,0,1m,1,2m,0)").unwrap();
        let devices: Vec<Box<dyn Device + Send>> = vec![Box::new(VoltageSource::new(
            "V1".into(),
            [NodeId::new(0), NodeId::GROUND],
            src,
            NodeId::new(1),
        ))];

        assert_eq!(next_breakpoint(&devices, 0.5e-3, 1e-11), Some(1e-3));
        // A corner closer than the minimum step is treated as reached
        let t = 1e-3 * (1.0 - 1e-12);
        assert_eq!(next_breakpoint(&devices, t, 1e-11), Some(2e-3));
        assert_eq!(next_breakpoint(&devices, 2e-3, 1e-11), None);
    }

    #[test]
    fn test_sine_is_sampled_per_period() {
        // Ten samples per period over ten periods, not ten over the run
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let src = Waveform::parse("sin(0,1,1k)").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, src).unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 1e3).unwrap();
        let tr = ckt.tran(10, 0.0, 10e-3, false).unwrap();

        let v = tr.signal("a").unwrap();
        for (&t, &value) in tr.time.iter().zip(v) {
            assert_abs_diff_eq!(value, (2.0 * std::f64::consts::PI * 1e3 * t).sin(), epsilon = 1e-9);
        }
        assert!(tr.time.windows(2).all(|w| w[1] - w[0] <= 1e-4 * (1.0 + 1e-9)));
        assert!(v.iter().cloned().fold(f64::MIN, f64::max) > 0.9);
        assert!(v.iter().cloned().fold(f64::MAX, f64::min) < -0.9);
    }

    #[test]
    fn test_steps_grow_on_slow_response() {
        // τ = 1 s against a 1 ms largest step: the error control lets the
        // step reach its bound instead of staying at the first step
        let mut ckt = Circuit::new();
        let vin = ckt.node("in").unwrap();
        let out = ckt.node("out").unwrap();
        ckt.voltage_source("V1", vin, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.resistor("R1", vin, out, 1e6).unwrap();
        ckt.capacitor("C1", out, NodeId::GROUND, 1e-6).unwrap();
        let tr = ckt.tran(100, 0.0, 0.1, true).unwrap();

        let largest = tr
            .time
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(0.0f64, f64::max);
        assert_abs_diff_eq!(largest, 1e-3, epsilon = 1e-9);
        assert!(tr.time.len() < 200);
    }

    #[test]
    fn test_skip_dc_finds_source_level_on_first_step() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, Waveform::Constant(5.0))
            .unwrap();
        ckt.resistor("R1", a, NodeId::GROUND, 1e3).unwrap();
        let tr = ckt.tran(10, 0.0, 1e-3, true).unwrap();

        let v = tr.signal("a").unwrap();
        assert_eq!(v[0], 0.0);
        assert_abs_diff_eq!(v[1], 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(*v.last().unwrap(), 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(*tr.signal("I(V1)").unwrap().last().unwrap(), -5e-3, epsilon = 1e-9);
    }

    #[test]
    fn test_inductor_current_ramps() {
        // 1V across 1mH: di/dt = 1000 A/s
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, Waveform::Constant(1.0))
            .unwrap();
        ckt.inductor("L1", a, NodeId::GROUND, 1e-3).unwrap();
        let tr = ckt.tran(100, 0.0, 1e-3, true).unwrap();
        let i_end = *tr.signal("I(L1)").unwrap().last().unwrap();
        assert_abs_diff_eq!(i_end, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_large_jump_converges_by_shrinking_steps() {
        let mut ckt = Circuit::new();
        let a = ckt.node("a").unwrap();
        let b = ckt.node("b").unwrap();
        let src = Waveform::parse("step(0,10,1m,1u)").unwrap();
        ckt.voltage_source("V1", a, NodeId::GROUND, src).unwrap();
        ckt.resistor("R1", a, b, 1e3).unwrap();
        ckt.resistor("R2", b, NodeId::GROUND, 1e3).unwrap();
        let tr = ckt.tran(20, 0.0, 2e-3, false).unwrap();
        assert_abs_diff_eq!(*tr.signal("b").unwrap().last().unwrap(), 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut ckt = rc_step(SimulatorConfig::default());
        assert!(matches!(
            ckt.tran(0, 0.0, 1.0, false),
            Err(SimError::InvalidSimulationParam { .. })
        ));
        assert!(matches!(
            ckt.tran(10, 1.0, 1.0, false),
            Err(SimError::InvalidSimulationParam { .. })
        ));
    }

    #[test]
    fn test_algebraic_rows() {
        // Node 0 has a capacitor, node 1 does not
        let c = Matrix::from_rows(&[&[1e-6, 0.0], &[0.0, 0.0]]);
        assert_eq!(algebraic_rows(&c), vec![false, true]);
    }

    #[test]
    fn test_interp_coeffs_reproduce_quadratic() {
        let f = |t: f64| 3.0 * t * t - 2.0 * t + 1.0;
        let (t0, t1, t2) = (3.0, 2.0, 0.5);
        let w = interp_coeffs(4.0, t0, t1, t2);
        assert_abs_diff_eq!(w[0] * f(t0) + w[1] * f(t1) + w[2] * f(t2), f(4.0), epsilon = 1e-9);
    }
}
