//! cktsim - Circuit Simulator
//!
//! Runs DC, transient or AC analysis on a JSON netlist and prints the
//! result as JSON.
//!
//! # Usage
//!
//! ```bash
//! cktsim divider.json dc
//! cktsim rc.json --method trap tran --samples 500 --stop 5m
//! cktsim filter.json ac --points 10 --fstart 10 --fstop 100k --source VIN
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cktsim::{
    error::{Result, SimError},
    netlist::parse_number,
    Circuit, IntegrationMethod, SimulatorConfig,
};
use serde::Serialize;

/// Modified nodal analysis circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file (JSON array of records)
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Integration method for transient analysis (be, trap)
    #[arg(short, long, default_value = "be")]
    method: String,

    #[command(subcommand)]
    analysis: Analysis,
}

#[derive(Subcommand, Debug)]
enum Analysis {
    /// DC operating point
    Dc,
    /// Transient analysis
    Tran {
        /// Time steps per period of the fastest periodic source
        #[arg(long, default_value_t = 100)]
        samples: usize,
        /// Start time (engineering notation accepted)
        #[arg(long, default_value = "0")]
        start: String,
        /// Stop time (engineering notation accepted)
        #[arg(long)]
        stop: String,
        /// Start from zero instead of the DC operating point
        #[arg(long)]
        skip_dc: bool,
    },
    /// Small-signal AC sweep
    Ac {
        /// Points per decade
        #[arg(long, default_value_t = 10)]
        points: usize,
        /// Start frequency in Hz
        #[arg(long, default_value = "1")]
        fstart: String,
        /// Stop frequency in Hz
        #[arg(long)]
        fstop: String,
        /// Name of the exciting source
        #[arg(long)]
        source: String,
    },
}

fn number(what: &str, text: &str) -> Result<f64> {
    parse_number(text).ok_or_else(|| SimError::invalid_param(format!("{} '{}' is not a number", what, text)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let method = IntegrationMethod::from_name(&args.method).ok_or_else(|| {
        SimError::invalid_param(format!("unknown integration method '{}'", args.method))
    })?;

    // Load the netlist
    let mut circuit = Circuit::load_netlist(&args.netlist)?;
    circuit.set_config(SimulatorConfig::new().with_integration(method));

    // Run the analysis
    match args.analysis {
        Analysis::Dc => print_json(&circuit.dc()?),
        Analysis::Tran {
            samples,
            start,
            stop,
            skip_dc,
        } => {
            let t_start = number("start time", &start)?;
            let t_stop = number("stop time", &stop)?;
            print_json(&circuit.tran(samples, t_start, t_stop, skip_dc)?)
        }
        Analysis::Ac {
            points,
            fstart,
            fstop,
            source,
        } => {
            let f_start = number("start frequency", &fstart)?;
            let f_stop = number("stop frequency", &fstop)?;
            print_json(&circuit.ac(points, f_start, f_stop, &source)?)
        }
    }
}
