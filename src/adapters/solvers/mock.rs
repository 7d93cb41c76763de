//! Mock solvers for testing and dry runs.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::adapters::handoff::{ProbePosition, ProbeTable};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{RadiativeTransferSolver, SolverRun, ZoneSolver};

/// Scripted behaviour of one mock solve.
#[derive(Debug, Clone)]
pub struct MockSolve {
    /// Text written to `<stem>.out`; `None` leaves the log untouched.
    pub log: Option<String>,
    /// Exit code reported for the solve.
    pub exit_code: i32,
    /// Simulated run time.
    pub delay: Duration,
}

impl Default for MockSolve {
    fn default() -> Self {
        Self {
            log: Some(" Cloudy exited OK\n".to_string()),
            exit_code: 0,
            delay: Duration::ZERO,
        }
    }
}

impl MockSolve {
    /// A clean run.
    pub fn clean() -> Self {
        Self::default()
    }

    /// A crash that leaves `marker` in the log.
    pub fn crash(marker: &str) -> Self {
        Self {
            log: Some(format!(
                " {marker} - the solver stopped\n Cloudy exited with problems\n"
            )),
            exit_code: 1,
            ..Self::default()
        }
    }

    /// A plain non-zero exit with no marker.
    pub fn exit(code: i32) -> Self {
        Self {
            log: Some(" Cloudy exited with problems\n".to_string()),
            exit_code: code,
            ..Self::default()
        }
    }

    /// Killed before the solver wrote anything.
    pub fn killed() -> Self {
        Self {
            log: None,
            exit_code: 137,
            ..Self::default()
        }
    }

    /// Hold the solve for `delay` before writing the log.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One recorded mock solve.
#[derive(Debug, Clone)]
pub struct SolveRecord {
    /// Zone index.
    pub zone: usize,
    /// File stem the solve used.
    pub stem: String,
    /// When the solve began.
    pub started: Instant,
    /// When the log was written.
    pub finished: Instant,
    /// Deck text found in `<stem>.in` when the solve started.
    pub deck: Option<String>,
}

/// Mock photoionization solver.
///
/// Zones without a script, or whose script ran out, use the default response.
#[derive(Debug)]
pub struct MockZoneSolver {
    default_response: MockSolve,
    scripts: Mutex<HashMap<usize, VecDeque<MockSolve>>>,
    records: Mutex<Vec<SolveRecord>>,
}

impl Default for MockZoneSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockZoneSolver {
    /// Mock where every solve is clean.
    pub fn new() -> Self {
        Self::with_default_response(MockSolve::default())
    }

    /// Mock answering unscripted solves with `response`.
    pub fn with_default_response(response: MockSolve) -> Self {
        Self {
            default_response: response,
            scripts: Mutex::new(HashMap::new()),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Queue responses for successive solves of `zone`.
    #[must_use]
    pub fn with_script(mut self, zone: usize, responses: Vec<MockSolve>) -> Self {
        self.scripts
            .get_mut()
            .entry(zone)
            .or_default()
            .extend(responses);
        self
    }

    /// Every solve so far, in completion order.
    pub async fn records(&self) -> Vec<SolveRecord> {
        self.records.lock().await.clone()
    }

    /// Number of solves made for `zone`.
    pub async fn call_count(&self, zone: usize) -> usize {
        self.records
            .lock()
            .await
            .iter()
            .filter(|record| record.zone == zone)
            .count()
    }
}

#[async_trait]
impl ZoneSolver for MockZoneSolver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn solve(&self, zone: usize, stem: &str, work_dir: &Path) -> DomainResult<SolverRun> {
        let response = self
            .scripts
            .lock()
            .await
            .get_mut(&zone)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_response.clone());

        let started = Instant::now();
        let deck = tokio::fs::read_to_string(work_dir.join(format!("{stem}.in")))
            .await
            .ok();
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        if let Some(log) = &response.log {
            tokio::fs::write(work_dir.join(format!("{stem}.out")), log).await?;
        }
        let finished = Instant::now();

        self.records.lock().await.push(SolveRecord {
            zone,
            stem: stem.to_string(),
            started,
            finished,
            deck,
        });

        Ok(SolverRun {
            exit_code: Some(response.exit_code),
            duration: finished - started,
        })
    }
}

/// Mock radiative-transfer solver.
///
/// Run `n` writes frame `n` as the probe file; once the frames run out the
/// last one is repeated.
#[derive(Debug)]
pub struct MockRadiativeTransfer {
    probe_file: PathBuf,
    frames: Vec<ProbeTable>,
    runs: AtomicUsize,
}

impl MockRadiativeTransfer {
    /// Mock writing `frames` to `probe_file`, one per run.
    pub fn new(probe_file: impl Into<PathBuf>, frames: Vec<ProbeTable>) -> Self {
        Self {
            probe_file: probe_file.into(),
            frames,
            runs: AtomicUsize::new(0),
        }
    }

    /// One frame per level; every position and wavelength carries that level.
    pub fn flat_levels(
        probe_file: impl Into<PathBuf>,
        wavelengths: &[f64],
        positions: usize,
        levels: &[f64],
    ) -> Self {
        let frames = levels
            .iter()
            .map(|&level| ProbeTable {
                wavelengths: wavelengths.to_vec(),
                positions: (0..positions)
                    .map(|index| ProbePosition {
                        position: [index as f64 + 1.0, 0.0, 0.0],
                        values: vec![level; wavelengths.len()],
                    })
                    .collect(),
            })
            .collect();
        Self::new(probe_file, frames)
    }

    /// Number of runs so far.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RadiativeTransferSolver for MockRadiativeTransfer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn run(&self, work_dir: &Path) -> DomainResult<SolverRun> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        let frame = self
            .frames
            .get(run)
            .or_else(|| self.frames.last())
            .ok_or_else(|| {
                DomainError::RadiativeTransferFailed("mock has no probe frames".to_string())
            })?;

        let started = Instant::now();
        tokio::fs::write(work_dir.join(&self.probe_file), frame.render()).await?;
        Ok(SolverRun {
            exit_code: Some(0),
            duration: started.elapsed(),
        })
    }
}
