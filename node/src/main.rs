// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tidal Node
//!
//! Entry point for the `tidal-node` binary. Parses CLI arguments, initializes
//! logging and metrics, and runs vault scenarios against an in-memory ledger.
//!
//! The binary supports three subcommands:
//!
//! - `simulate`     — run a scenario file and print the JSON report
//! - `check-config` — validate a vault configuration file
//! - `version`      — print build version information

mod cli;
mod logging;
mod metrics;
mod scenario;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use cli::{Commands, TidalNodeCli};
use metrics::NodeMetrics;

const DEFAULT_LOG_FILTER: &str = "tidal_node=info,tidal_vault=info,tidal_contracts=info";

fn main() -> Result<()> {
    let cli = TidalNodeCli::parse();

    match cli.command {
        Commands::Simulate(args) => {
            logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);
            simulate(args)
        }
        Commands::CheckConfig(args) => {
            logging::init_logging(DEFAULT_LOG_FILTER, cli.log_format);
            check_config(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Loads the scenario and config, runs it and prints the report.
fn simulate(args: cli::SimulateArgs) -> Result<()> {
    let scenario = scenario::load_scenario(&args.scenario)?;
    let config = match &args.config {
        Some(path) => scenario::load_config(path)?,
        None => scenario.vault.clone().unwrap_or_default(),
    };

    tracing::info!(
        scenario = %args.scenario.display(),
        operations = scenario.operations.len(),
        "starting simulation"
    );

    let metrics = NodeMetrics::new().context("failed to create metrics registry")?;
    let report = scenario::run(&scenario, config, &metrics)?;

    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    println!("{json}");

    if args.metrics {
        let text = metrics.encode().context("failed to encode metrics")?;
        println!("{text}");
    }

    if !report.solvent {
        return Err(anyhow!("vault reserves diverged from its ledger balances"));
    }
    Ok(())
}

/// Validates a config file and prints it with defaults filled in.
fn check_config(args: cli::CheckConfigArgs) -> Result<()> {
    let config = scenario::load_config(&args.config)?;
    let json = serde_json::to_string_pretty(&config).context("failed to encode config")?;
    tracing::info!(path = %args.config.display(), "config is valid");
    println!("{json}");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("tidal-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc      {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
