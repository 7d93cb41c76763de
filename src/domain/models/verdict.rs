//! Per-iteration convergence verdicts and run outcomes.

use serde::{Deserialize, Serialize};

use super::quantity::Criterion;

/// Why `stop` answered the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceOutcome {
    /// Still in the seeding phase before the start iteration.
    Seeding,
    /// At least one pair failed the criterion; iterate again.
    Continue,
    /// Every pair passed the criterion.
    Converged,
    /// The iteration cap was exceeded before the criterion passed.
    MaxIterationsReached,
}

impl ConvergenceOutcome {
    /// Snake-case name used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seeding => "seeding",
            Self::Continue => "continue",
            Self::Converged => "converged",
            Self::MaxIterationsReached => "max_iterations_reached",
        }
    }
}

/// The first (quantity, zone) pair that failed the criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairFailure {
    /// Name of the tracked quantity.
    pub quantity: String,
    /// Zone index.
    pub zone: usize,
    /// Criterion that failed.
    pub criterion: Criterion,
    /// Criterion-specific error measure (relative change, relative deviation, ...).
    pub error: f64,
    /// Tolerance the error was compared against.
    pub tolerance: f64,
}

/// Result of one `stop` call. Never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceVerdict {
    /// Iteration index passed to `stop`.
    pub iteration: usize,
    /// Iterations completed including this one.
    pub iterations_completed: usize,
    /// Decision of this call.
    pub outcome: ConvergenceOutcome,
    /// First failing pair, for `Continue` verdicts.
    pub failure: Option<PairFailure>,
}

impl ConvergenceVerdict {
    /// True when the loop should stop, for either reason.
    pub const fn should_stop(&self) -> bool {
        matches!(
            self.outcome,
            ConvergenceOutcome::Converged | ConvergenceOutcome::MaxIterationsReached
        )
    }

    /// True only when the criterion itself passed.
    pub const fn is_converged(&self) -> bool {
        matches!(self.outcome, ConvergenceOutcome::Converged)
    }
}

/// How a whole run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every pair passed the criterion.
    Converged,
    /// Forced stop; result quality is unverified.
    MaxIterationsReached,
}
