//! Domain errors for the radcoupler iteration loop.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::models::spectrum::SpectrumError;

/// Domain-level errors that can occur while driving the coupled solvers.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Handoff file not found: {}", .0.display())]
    HandoffMissing(PathBuf),

    #[error("Malformed handoff file {} at line {line}: {reason}", path.display())]
    MalformedHandoff {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Spectrum error for zone {zone}: {source}")]
    Spectrum {
        zone: usize,
        #[source]
        source: SpectrumError,
    },

    #[error(
        "Solver crashed in zone {zone}. Check {} for more details",
        log_path.display()
    )]
    SolverCrashed { zone: usize, log_path: PathBuf },

    #[error(
        "Solver crashed in zone {zone}. Disabling quantum heating did not solve the issue. Check {} for more details",
        log_path.display()
    )]
    SolverCrashPersisted { zone: usize, log_path: PathBuf },

    #[error("Solver for zone {zone} exited with status {code:?}. Check {} for more details", log_path.display())]
    SolverExited {
        zone: usize,
        code: Option<i32>,
        log_path: PathBuf,
    },

    #[error("Solver for zone {zone} did not finish within {timeout:?}")]
    SolverTimedOut { zone: usize, timeout: Duration },

    #[error("Failed to launch solver '{program}': {reason}")]
    SolverLaunch { program: String, reason: String },

    #[error("Radiative transfer run failed: {0}")]
    RadiativeTransferFailed(String),

    #[error("Parameter table {} line {line}: {reason}", path.display())]
    ParameterTable {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Unknown {option} option '{value}'")]
    UnknownOption { option: String, value: String },

    #[error("Incompatible zone options: {0}")]
    IncompatibleOptions(String),

    #[error("Zone count mismatch: expected {expected}, got {actual}")]
    ZoneCountMismatch { expected: usize, actual: usize },

    #[error("Iteration {iteration} is outside the record capacity of {capacity}")]
    IterationOutOfRange { iteration: usize, capacity: usize },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Attach a zone index to a spectrum error.
    pub const fn spectrum(zone: usize, source: SpectrumError) -> Self {
        Self::Spectrum { zone, source }
    }

    /// Whether the error came out of an external solver rather than the loop itself.
    pub const fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            Self::SolverCrashed { .. }
                | Self::SolverCrashPersisted { .. }
                | Self::SolverExited { .. }
                | Self::SolverTimedOut { .. }
                | Self::SolverLaunch { .. }
                | Self::RadiativeTransferFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crash_messages_point_to_the_log() {
        let err = DomainError::SolverCrashed {
            zone: 3,
            log_path: PathBuf::from("work/zone3.out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("zone 3"));
        assert!(msg.contains("work/zone3.out"));
        assert!(err.is_solver_failure());
    }

    #[test]
    fn persisted_crash_mentions_quantum_heating() {
        let err = DomainError::SolverCrashPersisted {
            zone: 1,
            log_path: PathBuf::from("zone1.out"),
        };
        assert!(err.to_string().contains("quantum heating"));
    }

    #[test]
    fn io_errors_are_not_solver_failures() {
        let err: DomainError = std::io::Error::other("disk full").into();
        assert!(!err.is_solver_failure());
    }
}
