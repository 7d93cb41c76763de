//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::check::CheckArgs;
use super::commands::run::RunArgs;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "radcoupler")]
#[command(
    about = "Couple a photoionization solver and a radiative-transfer solver until their radiation field converges",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the coupled iteration to convergence or the iteration cap
    Run(RunArgs),

    /// Validate the configuration and zone parameter table
    Check(CheckArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "radcoupler",
            "--json",
            "run",
            "--config",
            "run.yaml",
            "--max-iterations",
            "4",
            "--workers",
            "2",
            "--skip-seed",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.max_iterations, Some(4));
                assert_eq!(args.workers, Some(2));
                assert!(args.skip_seed);
                assert!(!args.dry_run);
            }
            Commands::Check(_) => panic!("expected run"),
        }
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["radcoupler", "check", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Check(_)));
    }
}
