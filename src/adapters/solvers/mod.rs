//! Solver adapters.
//!
//! - `process`: real executables via `tokio::process`
//! - `mock`: scripted in-process stand-ins

pub mod mock;
pub mod process;

pub use mock::{MockRadiativeTransfer, MockSolve, MockZoneSolver, SolveRecord};
pub use process::{
    expand_args, ProcessRadiativeTransfer, ProcessZoneSolver, RADIATIVE_TRANSFER_LOG,
};
