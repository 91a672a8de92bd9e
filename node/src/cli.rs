//! # CLI Interface
//!
//! Defines the command-line argument structure for `tidal-node` using
//! `clap` derive. Supports three subcommands: `simulate`, `check-config`
//! and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Tidal vault scenario runner.
///
/// Loads a JSON scenario (tokens, pools, buffers and a list of operations),
/// executes it against an in-memory vault and prints the results as JSON.
#[derive(Parser, Debug)]
#[command(
    name = "tidal-node",
    about = "Tidal vault scenario runner",
    version,
    propagate_version = true
)]
pub struct TidalNodeCli {
    /// Log output format. Logs always go to stderr.
    #[arg(long, global = true, value_enum, env = "TIDAL_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario file and print the report to stdout.
    Simulate(SimulateArgs),
    /// Validate a vault configuration file.
    CheckConfig(CheckConfigArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Scenario file (JSON).
    pub scenario: PathBuf,

    /// Vault configuration file (JSON).
    ///
    /// Takes precedence over a `vault` section inside the scenario.
    #[arg(long, short = 'c', env = "TIDAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the Prometheus text exposition after the report.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the `check-config` subcommand.
#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    /// Vault configuration file (JSON).
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        TidalNodeCli::command().debug_assert();
    }

    #[test]
    fn simulate_takes_a_path_and_flags() {
        let cli = TidalNodeCli::parse_from([
            "tidal-node",
            "--log-format",
            "json",
            "simulate",
            "run.json",
            "--metrics",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.scenario, PathBuf::from("run.json"));
                assert!(args.metrics);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
