//! DRAM subsystem simulator CLI.
//!
//! This binary loads a JSON configuration bundle and one or more request
//! traces, runs the simulation to completion, and prints the statistics
//! report. It performs:
//! 1. **Setup:** tracing subscriber (env-filtered; `Debug: true` lowers the
//!    default level), configuration parsing and validation.
//! 2. **Run:** builds the [`Simulator`] and drives it to completion.
//! 3. **Report:** human-readable stats on stdout, or JSON with `--json`.
//!
//! Every construction error is fatal: the subsystem and a one-line reason are
//! printed to stderr and the process exits non-zero.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dramsim_core::common::ConfigError;
use dramsim_core::sim::trace::parse_trace;
use dramsim_core::{Config, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "dramsim",
    author,
    version,
    about = "Cycle-accurate DRAM subsystem simulator",
    long_about = "Run a request trace against a configured DRAM subsystem.\n\n\
        The configuration bundle is one JSON document with mcconfig, simconfig,\n\
        memspec, and addressmapping sections. Traces are text files with one\n\
        `<cycle> <R|W> <hex-address> [hex-data]` request per line; one trace per\n\
        initiator thread.\n\nExamples:\n  dramsim -c configs/ddr4.json traces/stream.stl\n  dramsim -c configs/hbm2.json traces/core0.stl traces/core1.stl --json"
)]
struct Cli {
    /// Configuration bundle (JSON).
    #[arg(short, long)]
    config: String,

    /// Request trace files, one per initiator thread.
    #[arg(required = true)]
    traces: Vec<String>,

    /// Print the statistics report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<String, ConfigError> {
    let config_text = fs::read_to_string(&cli.config)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", cli.config)))?;
    let config = Config::from_json(&config_text)?;

    let default_level = if config.sim.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let memspec = dramsim_core::MemSpec::from_config(&config.memspec)?;
    let traces = cli
        .traces
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .map_err(|err| ConfigError::Parse(format!("{path}: {err}")))?;
            parse_trace(&text, &memspec)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut simulator = Simulator::new(&config, traces)?;
    simulator.run()?;

    if cli.json {
        serde_json::to_string_pretty(simulator.stats())
            .map_err(|err| ConfigError::Parse(err.to_string()))
    } else {
        Ok(format!(
            "simulation \"{}\" finished\n{}",
            config.sim.simulation_name,
            simulator.stats().report()
        ))
    }
}
