//! Radiative transfer port.

use std::path::Path;

use async_trait::async_trait;

use super::zone_solver::SolverRun;
use crate::domain::errors::DomainResult;

/// Trait for the Monte-Carlo radiative-transfer solver.
///
/// One run covers every zone and leaves a mean-intensity probe file in
/// `work_dir`. Failures are reported as errors, never as a non-zero
/// [`SolverRun::exit_code`].
#[async_trait]
pub trait RadiativeTransferSolver: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, work_dir: &Path) -> DomainResult<SolverRun>;
}
