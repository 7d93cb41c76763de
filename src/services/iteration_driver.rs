//! Iteration driver
//!
//! Sequences the coupled run. The driver owns the loop index and the wall
//! clock; every convergence decision belongs to the `ConvergenceEngine`.
//!
//! **PHASES**
//! -- SEED (optional, iteration 0): radiative transfer only, then convert its probe output
//! -- ITERATE (1, 2, ...): decks, zone solves, radiative transfer, conversion, `stop`
//! -- CONVERGED or MAX_ITERATIONS_REACHED
//!
//! After each ITERATE round the driver archives the round's files and rewrites
//! the diagnostics file when those are configured.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::cloudy::zone_stem;
use crate::adapters::handoff::{HandoffDirectory, ProbeConverter};
use crate::adapters::solvers::RADIATIVE_TRANSFER_LOG;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Config, ConvergenceOutcome, ConvergenceVerdict, RunConfig, RunOutcome, ZoneParameterTable,
};
use crate::domain::ports::{RadiativeTransferSolver, ZoneSolver};
use crate::services::archive::IterationArchive;
use crate::services::batch_scheduler::BatchScheduler;
use crate::services::convergence_engine::ConvergenceEngine;
use crate::services::solver_invoker::{InvocationOutcome, SolverInvoker};

/// How a run ended and what it took.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Why the run stopped.
    pub outcome: RunOutcome,
    /// `stop` calls made, seed included.
    pub iterations: usize,
    /// Index of the last iteration run.
    pub last_iteration: usize,
    /// Wall-clock duration of the whole run.
    pub elapsed: Duration,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Zones that only finished after quantum heating was switched off.
    pub weakened_zones: BTreeSet<usize>,
    /// One verdict per `stop` call.
    pub verdicts: Vec<ConvergenceVerdict>,
}

impl RunSummary {
    /// True when the criterion, not the cap, ended the run.
    pub const fn converged(&self) -> bool {
        matches!(self.outcome, RunOutcome::Converged)
    }
}

/// Outer loop of a coupled run.
///
/// Owns the convergence engine and hands zone solves to the scheduler; see the
/// module docs for the phase order.
pub struct IterationDriver {
    run_id: Uuid,
    work_dir: PathBuf,
    table: Arc<ZoneParameterTable>,
    invoker: Arc<SolverInvoker>,
    scheduler: BatchScheduler,
    radiative_transfer: Arc<dyn RadiativeTransferSolver>,
    converter: ProbeConverter,
    probe_output: PathBuf,
    handoff: HandoffDirectory,
    engine: ConvergenceEngine,
    archive: Option<IterationArchive>,
    run: RunConfig,
    diagnostics_file: Option<PathBuf>,
    weakened_zones: Arc<Mutex<BTreeSet<usize>>>,
}

impl IterationDriver {
    /// Wire up a driver for the zones in `table`.
    pub fn new(
        config: &Config,
        table: Arc<ZoneParameterTable>,
        zone_solver: Arc<dyn ZoneSolver>,
        radiative_transfer: Arc<dyn RadiativeTransferSolver>,
    ) -> DomainResult<Self> {
        let work_dir = config.work_dir.clone();
        let engine = ConvergenceEngine::from_config(&config.convergence, table.len())?;
        let invoker = SolverInvoker::new(
            zone_solver,
            &config.photoionization,
            table.clone(),
            work_dir.clone(),
        );

        Ok(Self {
            run_id: Uuid::new_v4(),
            handoff: HandoffDirectory::from_table(work_dir.clone(), &table),
            archive: config
                .run
                .archive
                .then(|| IterationArchive::new(work_dir.clone(), config.run.first_iteration)),
            diagnostics_file: config
                .convergence
                .diagnostics_file
                .as_ref()
                .map(|file| work_dir.join(file)),
            invoker: Arc::new(invoker),
            scheduler: BatchScheduler::from_config(&config.scheduler),
            radiative_transfer,
            converter: ProbeConverter::from_config(
                &config.photoionization,
                &config.radiative_transfer,
            ),
            probe_output: config.radiative_transfer.probe_output.clone(),
            engine,
            run: config.run.clone(),
            table,
            work_dir,
            weakened_zones: Arc::new(Mutex::new(BTreeSet::new())),
        })
    }

    /// Identifier attached to logs and the diagnostics header.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Convergence engine with the records so far.
    pub const fn engine(&self) -> &ConvergenceEngine {
        &self.engine
    }

    /// Run until the engine says stop.
    pub async fn run(&mut self) -> DomainResult<RunSummary> {
        let span = tracing::info_span!("run", run_id = %self.run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> DomainResult<RunSummary> {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!(
            zones = self.table.len(),
            workers = self.scheduler.workers(),
            mode = ?self.scheduler.mode(),
            seed = self.run.seed,
            "starting coupled run"
        );

        let mut last = if self.run.seed {
            let seed = self.seed().instrument(tracing::info_span!("iteration", iteration = 0));
            Some(seed.await?)
        } else {
            tracing::info!("seed skipped, reusing existing radiation field");
            None
        };

        let mut iteration = 0;
        let verdict = loop {
            if let Some(verdict) = last.take().filter(ConvergenceVerdict::should_stop) {
                break verdict;
            }
            iteration += 1;
            let verdict = self
                .iterate(iteration)
                .instrument(tracing::info_span!("iteration", iteration))
                .await?;
            tracing::info!(
                iteration,
                outcome = verdict.outcome.as_str(),
                elapsed_s = clock.elapsed().as_secs_f64(),
                "iteration finished"
            );
            last = Some(verdict);
        };

        let outcome = match verdict.outcome {
            ConvergenceOutcome::MaxIterationsReached => {
                tracing::warn!(
                    iterations = verdict.iterations_completed,
                    "stopped at the iteration cap, results are unverified"
                );
                RunOutcome::MaxIterationsReached
            }
            _ => {
                tracing::info!(iteration = verdict.iteration, "coupled run converged");
                RunOutcome::Converged
            }
        };

        Ok(RunSummary {
            run_id: self.run_id,
            outcome,
            iterations: verdict.iterations_completed,
            last_iteration: verdict.iteration,
            elapsed: clock.elapsed(),
            started_at,
            finished_at: Utc::now(),
            weakened_zones: self.weakened_zones.lock().await.clone(),
            verdicts: self.engine.verdicts().to_vec(),
        })
    }

    // ------------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------------

    async fn seed(&mut self) -> DomainResult<ConvergenceVerdict> {
        tracing::info!("seeding radiation field");
        self.radiative_transfer.run(&self.work_dir).await?;
        self.convert_probe()?;
        let verdict = self.engine.stop(0, &self.handoff)?;
        self.write_diagnostics()?;
        Ok(verdict)
    }

    async fn iterate(&mut self, iteration: usize) -> DomainResult<ConvergenceVerdict> {
        self.invoker.write_decks().await?;

        let zones = self.table.zone_indices();
        let invoker = self.invoker.clone();
        let weakened = self.weakened_zones.clone();
        let report = self
            .scheduler
            .run_all(&zones, move |zone| {
                let invoker = invoker.clone();
                let weakened = weakened.clone();
                async move {
                    if invoker.invoke(zone).await? == InvocationOutcome::RecoveredWithoutQheat {
                        weakened.lock().await.insert(zone);
                    }
                    Ok(())
                }
            })
            .await?;
        tracing::debug!(batches = report.batches.len(), "zone solves finished");

        self.radiative_transfer.run(&self.work_dir).await?;
        let extra_files = self.convert_probe()?;
        let verdict = self.engine.stop(iteration, &self.handoff)?;

        self.write_diagnostics()?;
        if let Some(archive) = &self.archive {
            archive
                .archive(iteration, &self.iteration_files(extra_files))
                .await?;
        }
        Ok(verdict)
    }

    fn convert_probe(&self) -> DomainResult<Vec<PathBuf>> {
        let report = self.converter.convert_file(
            &self.work_dir.join(&self.probe_output),
            self.handoff.files(),
            &self.work_dir,
        )?;
        Ok(report.extra_files)
    }

    fn write_diagnostics(&self) -> DomainResult<()> {
        let Some(path) = &self.diagnostics_file else {
            return Ok(());
        };
        let header = format!(
            "radcoupler convergence diagnostics\nrun {}\nwritten {}",
            self.run_id,
            Utc::now().to_rfc3339()
        );
        self.engine.write_diagnostics(path, &header)
    }

    /// Files produced by one ITERATE round, relative to the working directory.
    fn iteration_files(&self, extra_files: Vec<PathBuf>) -> Vec<PathBuf> {
        let decks = self.invoker.decks();
        let mut files = Vec::new();
        for (zone, params) in self.table.zones().iter().enumerate() {
            let stem = zone_stem(zone);
            files.push(PathBuf::from(format!("{stem}.in")));
            files.push(PathBuf::from(format!("{stem}.out")));
            files.extend(decks.output_files(zone).into_iter().map(PathBuf::from));
            files.push(params.sed_file.clone());
        }
        files.push(self.probe_output.clone());
        files.push(PathBuf::from(RADIATIVE_TRANSFER_LOG));
        files.extend(extra_files);
        if let Some(path) = &self.diagnostics_file {
            files.push(path.clone());
        }
        files
    }
}
