//! Process-backed solvers.
//!
//! Both solvers are launched as typed subprocesses (argument vector, no
//! shell) in the working directory. Dropping the future kills the child.

use std::path::Path;
use std::process::Output;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PhotoionizationConfig, RadiativeTransferConfig};
use crate::domain::ports::{RadiativeTransferSolver, SolverRun, ZoneSolver};

/// Log file receiving the radiative-transfer solver's stdout and stderr.
pub const RADIATIVE_TRANSFER_LOG: &str = "radiative_transfer.log";

/// Substitute `{name}` placeholders in an argument template.
pub fn expand_args(template: &[String], vars: &[(&str, &str)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter().fold(arg.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            })
        })
        .collect()
}

enum Completion {
    Finished(std::io::Result<Output>),
    TimedOut,
}

async fn run_command(mut command: Command, timeout: Option<Duration>) -> Completion {
    command.kill_on_drop(true);
    let output = command.output();
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, output).await {
            Ok(result) => Completion::Finished(result),
            Err(_) => Completion::TimedOut,
        },
        None => Completion::Finished(output.await),
    }
}

// ---------------------------------------------------------------------------
// ProcessZoneSolver
// ---------------------------------------------------------------------------

/// Runs the photoionization executable once per zone.
#[derive(Debug, Clone)]
pub struct ProcessZoneSolver {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessZoneSolver {
    /// `args` may contain `{stem}`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Solver using the configured binary and argument template.
    pub fn from_config(config: &PhotoionizationConfig) -> Self {
        Self::new(config.binary.clone(), config.args.clone())
    }

    /// Kill the process once `timeout` elapses.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ZoneSolver for ProcessZoneSolver {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn solve(&self, zone: usize, stem: &str, work_dir: &Path) -> DomainResult<SolverRun> {
        let args = expand_args(&self.args, &[("stem", stem)]);
        let mut command = Command::new(&self.program);
        command.args(&args).current_dir(work_dir);

        tracing::debug!(zone, program = %self.program, ?args, "launching zone solver");
        let started = Instant::now();
        let output = match run_command(command, self.timeout).await {
            Completion::Finished(result) => result.map_err(|e| {
                tracing::error!(zone, program = %self.program, error = %e, "failed to spawn zone solver");
                DomainError::SolverLaunch {
                    program: self.program.clone(),
                    reason: e.to_string(),
                }
            })?,
            Completion::TimedOut => {
                let timeout = self.timeout.unwrap_or_default();
                tracing::error!(zone, ?timeout, "zone solver timed out and was killed");
                return Err(DomainError::SolverTimedOut { zone, timeout });
            }
        };

        let run = SolverRun {
            exit_code: output.status.code(),
            duration: started.elapsed(),
        };
        if !output.stderr.is_empty() {
            tracing::debug!(
                zone,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "zone solver stderr"
            );
        }
        tracing::debug!(zone, exit_code = ?run.exit_code, elapsed_ms = run.duration.as_millis(), "zone solver finished");
        Ok(run)
    }
}

// ---------------------------------------------------------------------------
// ProcessRadiativeTransfer
// ---------------------------------------------------------------------------

/// Runs the radiative-transfer executable once per iteration.
#[derive(Debug, Clone)]
pub struct ProcessRadiativeTransfer {
    program: String,
    args: Vec<String>,
    threads: usize,
    ski_file: String,
    timeout: Option<Duration>,
}

impl ProcessRadiativeTransfer {
    /// Solver using the configured binary, threads and ski file.
    pub fn from_config(config: &RadiativeTransferConfig) -> Self {
        Self {
            program: config.binary.clone(),
            args: config.args.clone(),
            threads: config.threads,
            ski_file: config.ski_file.display().to_string(),
            timeout: None,
        }
    }

    /// Kill the process once `timeout` elapses.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn expanded_args(&self) -> Vec<String> {
        let threads = self.threads.to_string();
        expand_args(
            &self.args,
            &[("threads", threads.as_str()), ("ski", self.ski_file.as_str())],
        )
    }
}

#[async_trait]
impl RadiativeTransferSolver for ProcessRadiativeTransfer {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, work_dir: &Path) -> DomainResult<SolverRun> {
        let args = self.expanded_args();
        let mut command = Command::new(&self.program);
        command.args(&args).current_dir(work_dir);

        tracing::info!(program = %self.program, ?args, "launching radiative transfer");
        let started = Instant::now();
        let output = match run_command(command, self.timeout).await {
            Completion::Finished(result) => result.map_err(|e| DomainError::SolverLaunch {
                program: self.program.clone(),
                reason: e.to_string(),
            })?,
            Completion::TimedOut => {
                return Err(DomainError::RadiativeTransferFailed(format!(
                    "no result within {:?}",
                    self.timeout.unwrap_or_default()
                )));
            }
        };

        let log_path = work_dir.join(RADIATIVE_TRANSFER_LOG);
        let mut log = output.stdout.clone();
        log.extend_from_slice(&output.stderr);
        tokio::fs::write(&log_path, log).await?;

        let run = SolverRun {
            exit_code: output.status.code(),
            duration: started.elapsed(),
        };
        if !run.succeeded() {
            return Err(DomainError::RadiativeTransferFailed(format!(
                "exit status {:?}; check {} for more details",
                run.exit_code,
                log_path.display()
            )));
        }
        tracing::info!(elapsed_s = run.duration.as_secs_f64(), "radiative transfer finished");
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn expands_placeholders() {
        let args = expand_args(
            &["-t".to_string(), "{threads}".to_string(), "{ski}.ski".to_string()],
            &[("threads", "8"), ("ski", "model")],
        );
        assert_eq!(args, vec!["-t", "8", "model.ski"]);
    }

    #[tokio::test]
    async fn zone_solver_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ProcessZoneSolver::new("sh", sh("echo done > {stem}.out"));
        let run = solver.solve(0, "zone0", dir.path()).await.unwrap();
        assert!(run.succeeded());
        let log = std::fs::read_to_string(dir.path().join("zone0.out")).unwrap();
        assert_eq!(log.trim(), "done");
    }

    #[tokio::test]
    async fn zone_solver_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ProcessZoneSolver::new("sh", sh("exit 3"));
        let run = solver.solve(0, "zone0", dir.path()).await.unwrap();
        assert_eq!(run.exit_code, Some(3));
        assert!(!run.succeeded());
    }

    #[tokio::test]
    async fn zone_solver_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ProcessZoneSolver::new("sh", sh("sleep 5"))
            .with_timeout(Some(Duration::from_millis(100)));
        let err = solver.solve(2, "zone2", dir.path()).await.unwrap_err();
        assert!(matches!(err, DomainError::SolverTimedOut { zone: 2, .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let solver = ProcessZoneSolver::new("radcoupler-no-such-binary", vec![]);
        let err = solver.solve(0, "zone0", dir.path()).await.unwrap_err();
        assert!(matches!(err, DomainError::SolverLaunch { .. }));
    }

    #[tokio::test]
    async fn radiative_transfer_failure_keeps_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = RadiativeTransferConfig {
            binary: "sh".to_string(),
            args: sh("echo photons; exit 1"),
            ..RadiativeTransferConfig::default()
        };
        let err = ProcessRadiativeTransfer::from_config(&config)
            .run(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::RadiativeTransferFailed(_)));
        let log = std::fs::read_to_string(dir.path().join(RADIATIVE_TRANSFER_LOG)).unwrap();
        assert!(log.contains("photons"));
    }
}
