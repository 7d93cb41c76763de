//! Port trait definitions (Hexagonal Architecture)
//!
//! - ZoneSolver: one photoionization solve for one zone
//! - RadiativeTransferSolver: one radiative-transfer solve over every zone
//! - SpectrumSource: per-zone radiation field handed from one solver to the other

pub mod radiative_transfer;
pub mod spectrum_source;
pub mod zone_solver;

pub use radiative_transfer::RadiativeTransferSolver;
pub use spectrum_source::SpectrumSource;
pub use zone_solver::{SolverRun, ZoneSolver};
