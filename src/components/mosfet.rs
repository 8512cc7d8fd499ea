//! Square-law MOSFET with channel-length modulation.
//!
//! No bulk terminal, no body effect and no subthreshold conduction. The
//! device is symmetric: when the drain-source voltage reverses, drain and
//! source trade roles for that evaluation only.

use crate::circuit::{across, NodeId};
use crate::solver::MnaSystem;

use super::Device;

/// Threshold voltage magnitude (V).
pub const THRESHOLD: f64 = 0.5;

/// Process transconductance (A/V²).
pub const KP: f64 = 20e-6;

/// Channel-length modulation (1/V).
pub const LAMBDA: f64 = 0.05;

/// Channel polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetType {
    N,
    P,
}

impl FetType {
    /// +1 for N-channel, -1 for P-channel.
    pub fn sign(&self) -> f64 {
        match self {
            FetType::N => 1.0,
            FetType::P => -1.0,
        }
    }
}

/// Operating region of a MOSFET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Cutoff,
    Triode,
    Saturation,
}

/// Linearized channel at an operating point.
#[derive(Debug, Clone, Copy)]
pub struct Channel {
    pub region: Region,
    /// Effective drain after role swap
    pub drain: NodeId,
    /// Effective source after role swap
    pub source: NodeId,
    /// Drain-to-source current (signed for the channel type)
    pub ids: f64,
    /// Transconductance
    pub gm: f64,
    /// Output conductance
    pub gds: f64,
}

/// A MOSFET component.
#[derive(Debug, Clone)]
pub struct Mosfet {
    pub name: String,
    pub nodes: [NodeId; 3], // [drain, gate, source]
    pub fet_type: FetType,
    /// Width over length ratio
    pub ratio: f64,
    beta: f64,
}

impl Mosfet {
    /// Create a new MOSFET.
    pub fn new(name: String, nodes: [NodeId; 3], fet_type: FetType, ratio: f64) -> Self {
        Self {
            name,
            nodes,
            fet_type,
            ratio,
            beta: KP * ratio,
        }
    }

    /// Evaluate the channel at solution `x`.
    pub fn channel(&self, x: &[f64]) -> Channel {
        let [mut d, g, mut s] = self.nodes;
        let sign = self.fet_type.sign();

        let mut vds = sign * across(d, s, x);
        if vds < 0.0 {
            std::mem::swap(&mut d, &mut s);
            vds = -vds;
        }
        let vgst = sign * across(g, s, x) - THRESHOLD;
        let beta = self.beta;

        let (region, ids, gm, gds) = if vgst <= 0.0 {
            (Region::Cutoff, 0.0, 0.0, 0.0)
        } else if vgst < vds {
            let gm = beta * (1.0 + LAMBDA * vds) * vgst;
            let ids = sign * 0.5 * gm * vgst;
            let gds = 0.5 * beta * vgst * vgst * LAMBDA;
            (Region::Saturation, ids, gm, gds)
        } else {
            let k = beta * (1.0 + LAMBDA * vds);
            let ids = sign * k * vds * (vgst - 0.5 * vds);
            let gds = k * (vgst - vds) + beta * LAMBDA * vds * (vgst - 0.5 * vds);
            (Region::Triode, ids, k * vds, gds)
        };

        Channel {
            region,
            drain: d,
            source: s,
            ids,
            gm,
            gds,
        }
    }
}

impl Device for Mosfet {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_dc(&self, sys: &mut MnaSystem, x: &[f64], rhs: &mut [f64]) {
        let ch = self.channel(x);
        if ch.region == Region::Cutoff {
            return;
        }
        let (d, s, g) = (ch.drain, ch.source, self.nodes[1]);

        // Current flows into the drain and out of the source
        MnaSystem::add_to_rhs(rhs, d, -ch.ids);
        MnaSystem::add_to_rhs(rhs, s, ch.ids);
        sys.add_conductance(d, s, ch.gds);
        sys.add_to_g(s, s, ch.gm);
        sys.add_to_g(d, s, -ch.gm);
        sys.add_to_g(d, g, ch.gm);
        sys.add_to_g(s, g, -ch.gm);
    }
}
