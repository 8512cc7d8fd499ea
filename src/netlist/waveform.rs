//! Source waveform descriptors.
//!
//! A source value is either a bare literal (a DC level) or a function call
//! `name(arg, ...)`. Arguments are numeric literals; empty or missing
//! arguments take the documented defaults.
//!
//! | Function | Arguments (defaults) |
//! |----------|----------------------|
//! | `dc` | `v` (0) |
//! | `pulse` | `v1` (0), `v2` (1), `td` (0), `tr` (1n), `tf` (1n), `pw` (1e9), `per` (1e9) |
//! | `sin` | `voff` (0), `va` (1), `freq` (1), `td` (0), `phase` degrees (0) |
//! | `step` | `v1` (0), `v2` (1), `td` (0), `tr` (1n) |
//! | `square` | `v1` (0), `v2` (1), `freq` (1), `duty` percent (50) |
//! | `triangle` | `v1` (0), `v2` (1), `freq` (1) |
//! | `impulse` | `h` (1), `w` (1n) |
//! | `pwl` | `t1, v1, t2, v2, ...` |
//! | `pwl_repeating` | `t1, v1, t2, v2, ...` repeated with the last time as period |

use std::f64::consts::PI;

use super::value::parse_number;
use crate::error::{Result, SimError};

/// A parsed source waveform.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant level
    Constant(f64),
    /// Trapezoidal pulse train
    Pulse(Pulse),
    /// Delayed sinusoid
    Sine(Sine),
    /// Piecewise-linear table, optionally repeating
    Pwl(Pwl),
}

/// Trapezoidal pulse train.
#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub v1: f64,
    pub v2: f64,
    pub delay: f64,
    pub rise: f64,
    pub fall: f64,
    pub width: f64,
    pub period: f64,
    shape: Pwl,
}

impl Pulse {
    /// Create a pulse. Times are made non-negative.
    pub fn new(v1: f64, v2: f64, delay: f64, rise: f64, fall: f64, width: f64, period: f64) -> Self {
        let delay = delay.max(0.0);
        let (rise, fall, width, period) = (rise.abs(), fall.abs(), width.abs(), period.abs());
        let t1 = delay;
        let t2 = t1 + rise;
        let t3 = t2 + width;
        let t4 = t3 + fall;
        let shape = Pwl::new(
            vec![(t1, v1), (t2, v2), (t3, v2), (t4, v1), (period, v1)],
            true,
        );
        Self {
            v1,
            v2,
            delay,
            rise,
            fall,
            width,
            period,
            shape,
        }
    }
}

/// Sinusoid `voff + va * sin(2π(f(t - td) + phase/360))`, held at its
/// `t = td` phase before the delay.
#[derive(Debug, Clone, PartialEq)]
pub struct Sine {
    pub offset: f64,
    pub amplitude: f64,
    pub freq: f64,
    pub delay: f64,
    /// Phase offset in degrees
    pub phase: f64,
}

impl Sine {
    pub fn value(&self, t: f64) -> f64 {
        let phase = self.phase / 360.0;
        if t < self.delay {
            self.offset + self.amplitude * (2.0 * PI * phase).sin()
        } else {
            self.offset + self.amplitude * (2.0 * PI * (self.freq * (t - self.delay) + phase)).sin()
        }
    }
}

/// Piecewise-linear waveform over `(time, value)` points.
///
/// Before the first point and after the last the waveform holds the
/// nearest value. Points whose time does not increase are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Pwl {
    points: Vec<(f64, f64)>,
    repeat: bool,
}

impl Pwl {
    pub fn new(points: Vec<(f64, f64)>, repeat: bool) -> Self {
        Self { points, repeat }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Repeat period (the last point's time), if the table repeats.
    pub fn period(&self) -> Option<f64> {
        if !self.repeat {
            return None;
        }
        self.points.last().map(|&(t, _)| t).filter(|&p| p > 0.0)
    }

    /// Split `t` into the start of its period and the offset within it.
    fn fold(&self, t: f64) -> (f64, f64) {
        match self.period() {
            Some(per) => {
                let base = (t / per).floor() * per;
                (base, t - base)
            }
            None => (0.0, t),
        }
    }

    pub fn value(&self, t: f64) -> f64 {
        let Some(&(first_t, first_v)) = self.points.first() else {
            return 0.0;
        };
        let (_, t) = self.fold(t);

        let (mut last_t, mut last_v) = (first_t, first_v);
        if t > last_t {
            for &(next_t, next_v) in &self.points[1..] {
                if next_t > last_t && t < next_t {
                    return last_v + (next_v - last_v) * (t - last_t) / (next_t - last_t);
                }
                last_t = next_t;
                last_v = next_v;
            }
        }
        last_v
    }

    pub fn next_breakpoint(&self, t: f64) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }
        let (base, offset) = self.fold(t);
        self.points
            .iter()
            .map(|&(pt, _)| pt)
            .find(|&pt| offset < pt)
            .map(|pt| base + pt)
    }
}

impl Waveform {
    /// Parse a source descriptor such as `"5"`, `"sin(0,1,1k)"` or
    /// `"pwl(0,0,1m,5)"`.
    pub fn parse(text: &str) -> Result<Self> {
        let Some(open) = text.find('(') else {
            let v = parse_number(text)
                .ok_or_else(|| SimError::invalid_source(text, "not a number"))?;
            return Ok(Waveform::Constant(v));
        };

        let name = text[..open].trim().to_ascii_lowercase();
        let close = text[open..].find(')').map_or(text.len(), |i| open + i);
        let body = &text[open + 1..close];

        let args = if body.trim().is_empty() {
            Vec::new()
        } else {
            body.split(',')
                .map(|arg| {
                    let arg = arg.trim();
                    if arg.is_empty() {
                        Ok(None)
                    } else {
                        parse_number(arg).map(Some).ok_or_else(|| {
                            SimError::invalid_source(text, format!("argument '{}' is not a number", arg))
                        })
                    }
                })
                .collect::<Result<Vec<_>>>()?
        };
        let arg = |index: usize, default: f64| args.get(index).copied().flatten().unwrap_or(default);

        let waveform = match name.as_str() {
            "dc" => Waveform::Constant(arg(0, 0.0)),

            "pulse" => Waveform::Pulse(Pulse::new(
                arg(0, 0.0),
                arg(1, 1.0),
                arg(2, 0.0),
                arg(3, 1e-9),
                arg(4, 1e-9),
                arg(5, 1e9),
                arg(6, 1e9),
            )),

            "sin" => Waveform::Sine(Sine {
                offset: arg(0, 0.0),
                amplitude: arg(1, 1.0),
                freq: arg(2, 1.0).abs(),
                delay: arg(3, 0.0).max(0.0),
                phase: arg(4, 0.0),
            }),

            "step" => {
                let (v1, v2) = (arg(0, 0.0), arg(1, 1.0));
                let td = arg(2, 0.0).max(0.0);
                let tr = arg(3, 1e-9).abs();
                Waveform::Pwl(Pwl::new(vec![(td, v1), (td + tr, v2)], false))
            }

            "square" => {
                let (v1, v2) = (arg(0, 0.0), arg(1, 1.0));
                let per = period_of(text, arg(2, 1.0))?;
                let duty = arg(3, 50.0).abs().min(100.0);
                let t_change = 0.01 * per;
                let t_pw = 0.01 * duty * 0.98 * per;
                Waveform::Pwl(Pwl::new(
                    vec![
                        (0.0, v1),
                        (t_change, v2),
                        (t_change + t_pw, v2),
                        (2.0 * t_change + t_pw, v1),
                        (per, v1),
                    ],
                    true,
                ))
            }

            "triangle" => {
                let (v1, v2) = (arg(0, 0.0), arg(1, 1.0));
                let per = period_of(text, arg(2, 1.0))?;
                Waveform::Pwl(Pwl::new(vec![(0.0, v1), (per / 2.0, v2), (per, v1)], true))
            }

            "impulse" => {
                let h = arg(0, 1.0);
                let w = arg(1, 1e-9).abs();
                Waveform::Pwl(Pwl::new(vec![(0.0, 0.0), (w / 2.0, h), (w, 0.0)], false))
            }

            "pwl" | "pwl_repeating" => {
                let values: Vec<f64> = args.iter().map(|a| a.unwrap_or(0.0)).collect();
                let points = values.chunks_exact(2).map(|p| (p[0], p[1])).collect();
                Waveform::Pwl(Pwl::new(points, name == "pwl_repeating"))
            }

            _ => {
                return Err(SimError::invalid_source(
                    text,
                    format!("unknown source function '{}'", name),
                ))
            }
        };
        Ok(waveform)
    }

    /// Value at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Waveform::Constant(v) => *v,
            Waveform::Pulse(p) => p.shape.value(t),
            Waveform::Sine(s) => s.value(t),
            Waveform::Pwl(p) => p.value(t),
        }
    }

    /// The DC level, defined as the value at `t = 0`.
    pub fn dc(&self) -> f64 {
        self.value(0.0)
    }

    /// Next time strictly after `t` at which the waveform has a corner.
    pub fn next_breakpoint(&self, t: f64) -> Option<f64> {
        match self {
            Waveform::Constant(_) => None,
            Waveform::Pulse(p) => p.shape.next_breakpoint(t),
            Waveform::Sine(s) => (t < s.delay).then_some(s.delay),
            Waveform::Pwl(p) => p.next_breakpoint(t),
        }
    }

    /// Repeat period for periodic waveforms.
    pub fn period(&self) -> Option<f64> {
        match self {
            Waveform::Constant(_) => None,
            Waveform::Pulse(p) => p.shape.period(),
            Waveform::Sine(s) => (s.freq > 0.0).then(|| 1.0 / s.freq),
            Waveform::Pwl(p) => p.period(),
        }
    }
}

fn period_of(text: &str, freq: f64) -> Result<f64> {
    let freq = freq.abs();
    if freq == 0.0 {
        return Err(SimError::invalid_source(text, "frequency must be nonzero"));
    }
    Ok(1.0 / freq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn parse(text: &str) -> Waveform {
        match Waveform::parse(text) {
            Ok(w) => w,
            Err(e) => panic!("{}: {}", text, e),
        }
    }

    #[test]
    fn test_bare_literal_is_dc() {
        let w = parse("4.7k");
        assert_eq!(w, Waveform::Constant(4700.0));
        assert_eq!(w.dc(), 4700.0);
        assert_eq!(w.next_breakpoint(0.0), None);
        assert_eq!(parse("dc(3)").value(10.0), 3.0);
    }

    #[test]
    fn test_pulse_shape_and_breakpoints() {
        let w = parse("pulse(0,5,1m,1u,1u,2m,10m)");
        assert_abs_diff_eq!(w.value(0.0), 0.0);
        assert_abs_diff_eq!(w.value(1e-3 + 0.5e-6), 2.5, epsilon = 1e-9);
        assert_abs_diff_eq!(w.value(2e-3), 5.0);
        assert_abs_diff_eq!(w.value(5e-3), 0.0);
        // Second period
        assert_abs_diff_eq!(w.value(12e-3), 5.0, epsilon = 1e-9);

        assert_abs_diff_eq!(w.next_breakpoint(0.0).unwrap_or(-1.0), 1e-3);
        assert_abs_diff_eq!(w.next_breakpoint(2e-3).unwrap_or(-1.0), 3.001e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(w.next_breakpoint(10.5e-3).unwrap_or(-1.0), 11e-3, epsilon = 1e-12);
        assert_abs_diff_eq!(w.period().unwrap_or(0.0), 10e-3);
    }

    #[test]
    fn test_pulse_defaults() {
        let w = parse("pulse(0,1)");
        let Waveform::Pulse(p) = &w else {
            panic!("expected pulse");
        };
        assert_eq!(p.rise, 1e-9);
        assert_eq!(p.width, 1e9);
        assert_abs_diff_eq!(w.value(1.0), 1.0);
    }

    #[test]
    fn test_sine_delay_and_phase() {
        let w = parse("sin(1,2,1k,1m,90)");
        // Held at the phase value before the delay
        assert_abs_diff_eq!(w.value(0.0), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w.value(1e-3 + 0.25e-3), 1.0, epsilon = 1e-9);
        assert_eq!(w.next_breakpoint(0.0), Some(1e-3));
        assert_eq!(w.next_breakpoint(2e-3), None);
        assert_abs_diff_eq!(w.period().unwrap_or(0.0), 1e-3);
    }

    #[test]
    fn test_empty_arguments_take_defaults() {
        let w = parse("sin(, 2, , , )");
        let Waveform::Sine(s) = w else {
            panic!("expected sine");
        };
        assert_eq!(s.offset, 0.0);
        assert_eq!(s.amplitude, 2.0);
        assert_eq!(s.freq, 1.0);
    }

    #[test]
    fn test_step_square_triangle_impulse() {
        let step = parse("step(0,5,1m)");
        assert_eq!(step.value(0.0), 0.0);
        assert_eq!(step.value(1.0), 5.0);
        assert_eq!(step.next_breakpoint(0.0), Some(1e-3));

        let sq = parse("square(0,1,1k)");
        assert_abs_diff_eq!(sq.value(0.25e-3), 1.0);
        assert_abs_diff_eq!(sq.value(0.75e-3), 0.0);
        assert_abs_diff_eq!(sq.value(1.25e-3), 1.0, epsilon = 1e-9);

        let tri = parse("triangle(-1,1,1)");
        assert_abs_diff_eq!(tri.value(0.25), 0.0);
        assert_abs_diff_eq!(tri.value(0.5), 1.0);

        let imp = parse("impulse(2,1u)");
        assert_abs_diff_eq!(imp.value(0.5e-6), 2.0);
        assert_abs_diff_eq!(imp.value(2e-6), 0.0);
    }

    #[test]
    fn test_pwl() {
        let w = parse("pwl(0,0,1,10,2,10,3,0)");
        assert_abs_diff_eq!(w.value(0.5), 5.0);
        assert_abs_diff_eq!(w.value(2.5), 5.0);
        assert_abs_diff_eq!(w.value(5.0), 0.0);
        assert_eq!(w.next_breakpoint(1.5), Some(2.0));
        assert_eq!(w.next_breakpoint(3.0), None);
        assert_eq!(w.period(), None);

        let r = parse("pwl_repeating(0,0,1,1)");
        assert_abs_diff_eq!(r.value(2.5), 0.5);
        assert_eq!(r.next_breakpoint(2.5), Some(3.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Waveform::parse("ramp(1,2)"),
            Err(SimError::InvalidSource { .. })
        ));
        assert!(Waveform::parse("sin(1,x)").is_err());
        assert!(Waveform::parse("hello").is_err());
        assert!(Waveform::parse("square(0,1,0)").is_err());
    }
}
