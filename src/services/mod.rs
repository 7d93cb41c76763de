pub mod archive;
pub mod batch_scheduler;
pub mod convergence_engine;
pub mod iteration_driver;
pub mod solver_invoker;
pub mod statistics;

pub use archive::{ArchiveReport, IterationArchive};
pub use batch_scheduler::{BatchRecord, BatchScheduler, ScheduleReport};
pub use convergence_engine::ConvergenceEngine;
pub use iteration_driver::{IterationDriver, RunSummary};
pub use solver_invoker::{InvocationOutcome, SolverInvoker};
pub use statistics::{IterationRecords, RunningStats, Stat};
