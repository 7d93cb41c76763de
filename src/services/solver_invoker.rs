//! Solver invoker
//!
//! Runs the photoionization solver for exactly one zone and recovers from the
//! one known crash class: a fatal marker in the solver log while quantum
//! heating is enabled.
//!
//! **PHASES**
//! -- write `<stem>.in` from the zone parameters and its handoff file
//! -- solve, then scan `<stem>.out` for the fatal marker
//! -- on a marker, rewrite the deck without quantum heating and solve once more

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::cloudy::{zone_stem, DeckBuilder, DeckVariant};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{PhotoionizationConfig, ZoneParameterTable};
use crate::domain::ports::ZoneSolver;

/// How a zone's solve finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// First attempt ran without the fatal marker.
    Clean,
    /// The retry without quantum heating cleared the marker.
    RecoveredWithoutQheat,
}

/// Writes decks and runs the zone solver, with the single no-qheat retry.
pub struct SolverInvoker {
    solver: Arc<dyn ZoneSolver>,
    decks: DeckBuilder,
    table: Arc<ZoneParameterTable>,
    work_dir: PathBuf,
    fatal_marker: String,
}

impl SolverInvoker {
    /// Invoker writing decks for `table` into `work_dir`.
    pub fn new(
        solver: Arc<dyn ZoneSolver>,
        config: &PhotoionizationConfig,
        table: Arc<ZoneParameterTable>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            solver,
            decks: DeckBuilder::new(config),
            table,
            work_dir: work_dir.into(),
            fatal_marker: config.fatal_marker.clone(),
        }
    }

    /// Directory decks and logs live in.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Deck builder used for every zone.
    pub const fn decks(&self) -> &DeckBuilder {
        &self.decks
    }

    /// Path of the solver log for `zone`.
    pub fn log_path(&self, zone: usize) -> PathBuf {
        self.work_dir.join(format!("{}.out", zone_stem(zone)))
    }

    /// Write the deck for `zone`, reading its handoff file for the normalization.
    pub async fn write_deck(&self, zone: usize, variant: DeckVariant) -> DomainResult<PathBuf> {
        let params = self.table.zone(zone).ok_or(DomainError::ZoneCountMismatch {
            expected: self.table.len(),
            actual: zone + 1,
        })?;

        let sed_path = self.work_dir.join(&params.sed_file);
        let sed_text = match tokio::fs::read_to_string(&sed_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DomainError::HandoffMissing(sed_path));
            }
            Err(e) => return Err(e.into()),
        };

        let deck = self
            .decks
            .render(zone, params, self.table.options(), &sed_text, variant);
        let deck_path = self.work_dir.join(format!("{}.in", zone_stem(zone)));
        tokio::fs::write(&deck_path, deck).await?;
        Ok(deck_path)
    }

    /// Write standard decks for every zone in the table.
    pub async fn write_decks(&self) -> DomainResult<()> {
        for zone in self.table.zone_indices() {
            self.write_deck(zone, DeckVariant::Standard).await?;
        }
        Ok(())
    }

    /// Solve `zone` from its already-written deck.
    pub async fn invoke(&self, zone: usize) -> DomainResult<InvocationOutcome> {
        let stem = zone_stem(zone);
        let log_path = self.log_path(zone);

        let run = self.solver.solve(zone, &stem, &self.work_dir).await?;
        if !self.log_has_marker(&log_path).await? {
            if !run.succeeded() {
                tracing::error!(zone, exit_code = ?run.exit_code, "zone solver exited with failure");
                return Err(DomainError::SolverExited {
                    zone,
                    code: run.exit_code,
                    log_path,
                });
            }
            tracing::debug!(zone, elapsed_ms = run.duration.as_millis(), "zone solved");
            return Ok(InvocationOutcome::Clean);
        }

        if self.decks.qheat_disabled() {
            tracing::error!(zone, log = %log_path.display(), "zone solver crashed");
            return Err(DomainError::SolverCrashed { zone, log_path });
        }

        tracing::warn!(
            zone,
            marker = %self.fatal_marker,
            "zone solver crashed, retrying once without quantum heating"
        );
        self.write_deck(zone, DeckVariant::NoQheatFallback).await?;
        remove_stale_log(&log_path).await?;
        let retry = self.solver.solve(zone, &stem, &self.work_dir).await?;

        if self.log_has_marker(&log_path).await? {
            tracing::error!(zone, log = %log_path.display(), "zone solver crashed again without quantum heating");
            return Err(DomainError::SolverCrashPersisted { zone, log_path });
        }
        if !retry.succeeded() {
            return Err(DomainError::SolverExited {
                zone,
                code: retry.exit_code,
                log_path,
            });
        }

        tracing::warn!(
            zone,
            "zone recovered with weakened physics: quantum heating disabled and extra outputs skipped"
        );
        Ok(InvocationOutcome::RecoveredWithoutQheat)
    }

    async fn log_has_marker(&self, log_path: &Path) -> DomainResult<bool> {
        match tokio::fs::read_to_string(log_path).await {
            Ok(log) => Ok(log.contains(&self.fatal_marker)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Drop the previous attempt's log so a retry is never judged by it.
async fn remove_stale_log(log_path: &Path) -> DomainResult<()> {
    match tokio::fs::remove_file(log_path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
