//! Zone solver port - interface for the photoionization solver.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Result of one external solver execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverRun {
    /// Process exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl SolverRun {
    /// True for a zero exit code.
    pub const fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Trait for photoionization solver implementations.
///
/// A solve reads `<stem>.in` from `work_dir` and writes `<stem>.out` plus its
/// result files next to it. Implementations must not touch files belonging to
/// other stems; zones of one batch run concurrently in the same directory.
#[async_trait]
pub trait ZoneSolver: Send + Sync {
    /// Get the solver name.
    fn name(&self) -> &'static str;

    /// Run the solver for one zone to completion.
    async fn solve(&self, zone: usize, stem: &str, work_dir: &Path) -> DomainResult<SolverRun>;
}
