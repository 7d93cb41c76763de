//! Implementation of the `radcoupler run` command.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::adapters::solvers::{
    MockRadiativeTransfer, MockZoneSolver, ProcessRadiativeTransfer, ProcessZoneSolver,
};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, RunOutcome};
use crate::domain::ports::{RadiativeTransferSolver, ZoneSolver};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::services::{IterationDriver, RunSummary};

use super::{load_config, load_table};

/// Exit status when the iteration cap forced the stop.
pub const EXIT_MAX_ITERATIONS: u8 = 3;

/// Wavelengths (microns) of the flat field written by `--dry-run`.
const DRY_RUN_WAVELENGTHS: [f64; 4] = [0.1, 0.5, 1.0, 10.0];

/// Arguments for `radcoupler run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults to radcoupler.yaml plus environment overrides)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override convergence.max_iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Override scheduler.workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Reuse the existing radiation field instead of running the seed iteration
    #[arg(long)]
    pub skip_seed: bool,

    /// Run the loop with in-process mock solvers
    #[arg(long)]
    pub dry_run: bool,
}

/// Result of a finished run.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    ///
    #[serde(flatten)]
    pub summary: RunSummary,
    /// Working directory the run used.
    pub work_dir: PathBuf,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let summary = &self.summary;
        let mut lines = vec![match summary.outcome {
            RunOutcome::Converged => format!(
                "Converged at iteration {} after {} iteration(s).",
                summary.last_iteration, summary.iterations
            ),
            RunOutcome::MaxIterationsReached => format!(
                "Stopped at the iteration cap after {} iteration(s); results are unverified.",
                summary.iterations
            ),
        }];
        lines.push(format!("  run id:   {}", summary.run_id));
        lines.push(format!("  work dir: {}", self.work_dir.display()));
        lines.push(format!("  elapsed:  {:.1}s", summary.elapsed.as_secs_f64()));
        if let Some(failure) = summary.verdicts.last().and_then(|v| v.failure.as_ref()) {
            lines.push(format!(
                "  last failing pair: quantity '{}' zone {} ({} error {:.3e}, tolerance {})",
                failure.quantity, failure.zone, failure.criterion, failure.error, failure.tolerance
            ));
        }
        if !summary.weakened_zones.is_empty() {
            let zones: Vec<String> = summary.weakened_zones.iter().map(ToString::to_string).collect();
            lines.push(format!(
                "  zones run without quantum heating: {}",
                zones.join(", ")
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(max_iterations) = args.max_iterations {
        config.convergence.max_iterations = max_iterations;
    }
    if let Some(workers) = args.workers {
        config.scheduler.workers = workers;
    }
    if args.skip_seed {
        config.run.seed = false;
    }
}

/// Run the coupled loop to completion.
///
/// Returns exit status 0 on convergence and 3 when the iteration cap stopped the run.
pub async fn execute(args: RunArgs, json_mode: bool) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    ConfigLoader::validate(&config).context("Invalid command-line overrides")?;

    let log_config = LogConfig::try_from(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config)?;

    let table = load_table(&config)?;
    for warning in table.check_compatibility()? {
        tracing::warn!("{warning}");
    }
    let table = Arc::new(table);

    let (zone_solver, radiative_transfer): (Arc<dyn ZoneSolver>, Arc<dyn RadiativeTransferSolver>) =
        if args.dry_run {
            tracing::info!("dry run with mock solvers");
            (
                Arc::new(MockZoneSolver::new()),
                Arc::new(MockRadiativeTransfer::flat_levels(
                    config.radiative_transfer.probe_output.clone(),
                    &DRY_RUN_WAVELENGTHS,
                    table.len(),
                    &[1.0e-3],
                )),
            )
        } else {
            let timeout = config.scheduler.solver_timeout_secs.map(Duration::from_secs);
            (
                Arc::new(
                    ProcessZoneSolver::from_config(&config.photoionization).with_timeout(timeout),
                ),
                Arc::new(
                    ProcessRadiativeTransfer::from_config(&config.radiative_transfer)
                        .with_timeout(timeout),
                ),
            )
        };

    let mut driver = IterationDriver::new(&config, table, zone_solver, radiative_transfer)
        .context("Failed to set up the iteration driver")?;
    let summary = driver.run().await.context("Coupled run failed")?;

    let exit = match summary.outcome {
        RunOutcome::Converged => ExitCode::SUCCESS,
        RunOutcome::MaxIterationsReached => ExitCode::from(EXIT_MAX_ITERATIONS),
    };
    output(
        &RunOutput {
            summary,
            work_dir: config.work_dir.clone(),
        },
        json_mode,
    );
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let mut config = Config::default();
        let args = RunArgs {
            config: None,
            max_iterations: Some(2),
            workers: Some(7),
            skip_seed: true,
            dry_run: false,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.convergence.max_iterations, 2);
        assert_eq!(config.scheduler.workers, 7);
        assert!(!config.run.seed);
    }

    #[test]
    fn absent_overrides_keep_config() {
        let mut config = Config::default();
        let args = RunArgs {
            config: None,
            max_iterations: None,
            workers: None,
            skip_seed: false,
            dry_run: false,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.convergence.max_iterations, 10);
        assert!(config.run.seed);
    }
}
