//! Radcoupler - coupled photoionization / radiative-transfer iteration controller
//!
//! Radcoupler alternates a per-zone photoionization solver and a Monte-Carlo
//! radiative-transfer solver, handing the radiation field between them until the
//! tracked quantities stop changing or the iteration cap is reached.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the solver ports
//! - **Service Layer** (`services`): convergence engine, scheduler, invoker, driver
//! - **Adapters** (`adapters`): deck rendering, handoff files, process and mock solvers
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use radcoupler::adapters::solvers::{ProcessRadiativeTransfer, ProcessZoneSolver};
//! use radcoupler::{ConfigLoader, IterationDriver, ZoneParameterTable};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let table = Arc::new(ZoneParameterTable::load(&config.parameters)?);
//!     let mut driver = IterationDriver::new(
//!         &config,
//!         table,
//!         Arc::new(ProcessZoneSolver::from_config(&config.photoionization)),
//!         Arc::new(ProcessRadiativeTransfer::from_config(&config.radiative_transfer)),
//!     )?;
//!     let summary = driver.run().await?;
//!     println!("{:?}", summary.outcome);
//!     Ok(())
//! }
//! ```

/// File formats and solver implementations.
pub mod adapters;
/// Command-line interface.
pub mod cli;
/// Models, errors and ports.
pub mod domain;
/// Configuration and logging.
pub mod infrastructure;
/// Convergence engine, scheduling and the iteration loop.
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, ConvergenceOutcome, ConvergenceVerdict, Criterion, RunOutcome, Spectrum,
    TrackedQuantity, WavelengthSpec, ZoneParameterTable,
};
pub use domain::ports::{RadiativeTransferSolver, SpectrumSource, ZoneSolver};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BatchScheduler, ConvergenceEngine, IterationDriver, RunSummary, SolverInvoker};
