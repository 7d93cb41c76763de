//! Convergence engine service.
//!
//! The `ConvergenceEngine` decides, once per iteration, whether the radiation
//! field exchanged between the two solvers has stabilized. For every tracked
//! quantity and every zone it:
//!
//! - **OBSERVE** -- reads the quantity off the zone's current spectrum.
//! - **ACCUMULATE** -- updates running mean, variance, median and percentile
//!   spread over the iterations since the start iteration.
//! - **EVALUATE** -- applies the configured criterion; every pair must pass.
//! - **CAP** -- forces a stop once more than `max_iterations` calls were made,
//!   reported as a distinct outcome from convergence.

use std::fmt::Write as _;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConvergenceConfig, ConvergenceOutcome, ConvergenceVerdict, Criterion, PairFailure,
    TrackedQuantity,
};
use crate::domain::ports::SpectrumSource;

use super::statistics::{running_stats, IterationRecords, Stat};

// ---------------------------------------------------------------------------
// PairCheck
// ---------------------------------------------------------------------------

/// Outcome of one criterion test on one (quantity, zone) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PairCheck {
    passed: bool,
    /// Criterion-specific error measure, comparable against the tolerance.
    error: f64,
}

impl PairCheck {
    const fn failed() -> Self {
        Self {
            passed: false,
            error: f64::INFINITY,
        }
    }
}

/// A mean or median that cannot anchor a relative test.
fn is_degenerate(reference: f64) -> bool {
    !reference.is_finite() || reference == 0.0
}

// ---------------------------------------------------------------------------
// ConvergenceEngine
// ---------------------------------------------------------------------------

/// Owns the tracked quantities and the record array for one run.
#[derive(Debug, Clone)]
pub struct ConvergenceEngine {
    quantities: Vec<TrackedQuantity>,
    criterion: Criterion,
    zones: usize,
    max_iterations: usize,
    start_iteration: usize,
    records: IterationRecords,
    /// Number of `stop` calls completed so far.
    completed: usize,
    verdicts: Vec<ConvergenceVerdict>,
}

impl ConvergenceEngine {
    /// Create an engine for `zones` zones.
    ///
    /// Tolerances must be finite and non-negative. A zero tolerance is legal
    /// and makes every criterion unpassable, leaving only the iteration cap.
    pub fn new(
        quantities: Vec<TrackedQuantity>,
        criterion: Criterion,
        zones: usize,
        max_iterations: usize,
        start_iteration: usize,
    ) -> DomainResult<Self> {
        if quantities.is_empty() {
            return Err(DomainError::ValidationFailed(
                "at least one tracked quantity is required".to_string(),
            ));
        }
        if zones == 0 {
            return Err(DomainError::ValidationFailed(
                "at least one zone is required".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(DomainError::ValidationFailed(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        for quantity in &quantities {
            if !quantity.tolerance.is_finite() || quantity.tolerance < 0.0 {
                return Err(DomainError::ValidationFailed(format!(
                    "quantity '{}' has invalid tolerance {}",
                    quantity.name, quantity.tolerance
                )));
            }
            if !quantity.wavelength.is_valid() {
                return Err(DomainError::ValidationFailed(format!(
                    "quantity '{}' has invalid wavelength {}",
                    quantity.name, quantity.wavelength
                )));
            }
        }

        // One slot per call plus the iteration-0 seed slot.
        let capacity = max_iterations + 2;
        let records = IterationRecords::new(quantities.len(), capacity, zones);

        Ok(Self {
            quantities,
            criterion,
            zones,
            max_iterations,
            start_iteration,
            records,
            completed: 0,
            verdicts: Vec::new(),
        })
    }

    /// Build an engine from the `convergence` config section.
    pub fn from_config(config: &ConvergenceConfig, zones: usize) -> DomainResult<Self> {
        Self::new(
            config.quantities.clone(),
            config.criterion,
            zones,
            config.max_iterations,
            config.start_iteration,
        )
    }

    /// Tracked quantities, in record order.
    pub fn quantities(&self) -> &[TrackedQuantity] {
        &self.quantities
    }

    /// Criterion applied to every pair.
    pub const fn criterion(&self) -> Criterion {
        self.criterion
    }

    /// Number of zones.
    pub const fn zones(&self) -> usize {
        self.zones
    }

    /// Iteration cap.
    pub const fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// First iteration whose values take part in the criteria.
    pub const fn start_iteration(&self) -> usize {
        self.start_iteration
    }

    /// Number of `stop` calls made so far.
    pub const fn iterations_completed(&self) -> usize {
        self.completed
    }

    /// Raw values and running statistics so far.
    pub const fn records(&self) -> &IterationRecords {
        &self.records
    }

    /// Every verdict returned so far, oldest first.
    pub fn verdicts(&self) -> &[ConvergenceVerdict] {
        &self.verdicts
    }

    /// Read every tracked quantity for every zone from `source`, then decide.
    ///
    /// Once the cap is reached nothing is read and the call stops outright.
    pub fn stop(
        &mut self,
        iteration: usize,
        source: &dyn SpectrumSource,
    ) -> DomainResult<ConvergenceVerdict> {
        if source.zone_count() != self.zones {
            return Err(DomainError::ZoneCountMismatch {
                expected: self.zones,
                actual: source.zone_count(),
            });
        }
        self.records.check_iteration(iteration)?;
        if self.cap_reached() {
            return Ok(self.finish(iteration, ConvergenceOutcome::MaxIterationsReached, None));
        }

        let mut values = vec![vec![0.0; self.zones]; self.quantities.len()];
        for zone in 0..self.zones {
            let spectrum = source.load(zone)?;
            for (q, quantity) in self.quantities.iter().enumerate() {
                values[q][zone] = quantity
                    .wavelength
                    .evaluate(&spectrum)
                    .map_err(|err| DomainError::spectrum(zone, err))?;
            }
        }

        self.stop_with_values(iteration, &values)
    }

    /// Decide from already-evaluated values, indexed `[quantity][zone]`.
    pub fn stop_with_values(
        &mut self,
        iteration: usize,
        values: &[Vec<f64>],
    ) -> DomainResult<ConvergenceVerdict> {
        self.records.check_iteration(iteration)?;
        if values.len() != self.quantities.len() {
            return Err(DomainError::ValidationFailed(format!(
                "expected values for {} quantities, got {}",
                self.quantities.len(),
                values.len()
            )));
        }
        if let Some(row) = values.iter().find(|row| row.len() != self.zones) {
            return Err(DomainError::ZoneCountMismatch {
                expected: self.zones,
                actual: row.len(),
            });
        }

        self.record(iteration, values);

        let (outcome, failure) = if self.cap_reached() {
            (ConvergenceOutcome::MaxIterationsReached, None)
        } else if iteration < self.start_iteration {
            (ConvergenceOutcome::Seeding, None)
        } else {
            match self.first_failure(iteration) {
                None => (ConvergenceOutcome::Converged, None),
                Some(failure) => (ConvergenceOutcome::Continue, Some(failure)),
            }
        };
        Ok(self.finish(iteration, outcome, failure))
    }

    /// True once this call would take the counter past `max_iterations`.
    const fn cap_reached(&self) -> bool {
        self.completed + 1 > self.max_iterations
    }

    /// Count the call, log and keep the verdict.
    fn finish(
        &mut self,
        iteration: usize,
        outcome: ConvergenceOutcome,
        failure: Option<PairFailure>,
    ) -> ConvergenceVerdict {
        self.completed += 1;
        let verdict = ConvergenceVerdict {
            iteration,
            iterations_completed: self.completed,
            outcome,
            failure,
        };
        self.log_verdict(&verdict);
        self.verdicts.push(verdict.clone());
        verdict
    }

    /// Store raw values and refresh the running statistics of `iteration`.
    fn record(&mut self, iteration: usize, values: &[Vec<f64>]) {
        for (q, row) in values.iter().enumerate() {
            for (zone, &value) in row.iter().enumerate() {
                self.records.set(q, iteration, zone, Stat::Value, value);
                if iteration >= self.start_iteration {
                    let history = self
                        .records
                        .history(q, zone, self.start_iteration, iteration);
                    self.records
                        .store_stats(q, iteration, zone, running_stats(&history));
                }
            }
        }
    }

    /// First failing pair in (quantity, zone) order, or `None` if all pass.
    fn first_failure(&self, iteration: usize) -> Option<PairFailure> {
        for (q, quantity) in self.quantities.iter().enumerate() {
            for zone in 0..self.zones {
                let check = self.check_pair(q, iteration, zone);
                if !check.passed {
                    return Some(PairFailure {
                        quantity: quantity.name.clone(),
                        zone,
                        criterion: self.criterion,
                        error: check.error,
                        tolerance: quantity.tolerance,
                    });
                }
            }
        }
        None
    }

    fn check_pair(&self, q: usize, iteration: usize, zone: usize) -> PairCheck {
        let tolerance = self.quantities[q].tolerance;
        match self.criterion {
            Criterion::Previous => self.check_previous(q, iteration, zone, tolerance),
            Criterion::Variance => self.check_variance(q, iteration, zone, tolerance),
            Criterion::Statistic => self.check_statistic(q, iteration, zone, tolerance),
            Criterion::Both => {
                let previous = self.check_previous(q, iteration, zone, tolerance);
                let variance = self.check_variance(q, iteration, zone, tolerance);
                PairCheck {
                    passed: previous.passed && variance.passed,
                    error: previous.error.max(variance.error),
                }
            }
        }
    }

    /// `|curr - prev| < tol * (curr + prev) / 2`
    fn check_previous(&self, q: usize, iteration: usize, zone: usize, tolerance: f64) -> PairCheck {
        let Some(previous_iteration) = iteration.checked_sub(1) else {
            return PairCheck::failed();
        };
        let current = self.records.get(q, iteration, zone, Stat::Value);
        let previous = self.records.get(q, previous_iteration, zone, Stat::Value);
        if current.is_nan() || previous.is_nan() {
            return PairCheck::failed();
        }
        let average = 0.5 * (current + previous);
        if is_degenerate(average) {
            return PairCheck::failed();
        }
        let difference = (current - previous).abs();
        PairCheck {
            passed: difference < tolerance * average,
            error: difference / average.abs(),
        }
    }

    /// `sqrt(variance) / mean < tol`
    fn check_variance(&self, q: usize, iteration: usize, zone: usize, tolerance: f64) -> PairCheck {
        let mean = self.records.get(q, iteration, zone, Stat::Mean);
        let variance = self.records.get(q, iteration, zone, Stat::Variance);
        if is_degenerate(mean) || variance.is_nan() {
            return PairCheck::failed();
        }
        let error = variance.sqrt() / mean.abs();
        PairCheck {
            passed: error < tolerance,
            error,
        }
    }

    /// `half_spread / sqrt(n - 1) < tol * median`
    fn check_statistic(&self, q: usize, iteration: usize, zone: usize, tolerance: f64) -> PairCheck {
        let samples = self
            .records
            .history(q, zone, self.start_iteration, iteration)
            .len();
        if samples < 2 {
            return PairCheck::failed();
        }
        let median = self.records.get(q, iteration, zone, Stat::Median);
        let half_spread = self.records.get(q, iteration, zone, Stat::HalfSpread);
        if is_degenerate(median) || half_spread.is_nan() {
            return PairCheck::failed();
        }
        let standard_error = half_spread / ((samples - 1) as f64).sqrt();
        PairCheck {
            passed: standard_error < tolerance * median.abs(),
            error: standard_error / median.abs(),
        }
    }

    fn log_verdict(&self, verdict: &ConvergenceVerdict) {
        match verdict.outcome {
            ConvergenceOutcome::Seeding => tracing::info!(
                iteration = verdict.iteration,
                start_iteration = self.start_iteration,
                "seeding statistics, convergence not checked yet"
            ),
            ConvergenceOutcome::Continue => {
                if let Some(failure) = &verdict.failure {
                    tracing::info!(
                        iteration = verdict.iteration,
                        quantity = %failure.quantity,
                        zone = failure.zone,
                        criterion = %failure.criterion,
                        error = failure.error,
                        tolerance = failure.tolerance,
                        "not converged"
                    );
                }
            }
            ConvergenceOutcome::Converged => tracing::info!(
                iteration = verdict.iteration,
                criterion = %self.criterion,
                "converged: every quantity passed in every zone"
            ),
            ConvergenceOutcome::MaxIterationsReached => tracing::warn!(
                iteration = verdict.iteration,
                max_iterations = self.max_iterations,
                "iteration cap reached before convergence; results are unverified"
            ),
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Plain-text dump of every iteration seen so far.
    pub fn render_diagnostics(&self, header: &str) -> String {
        let mut out = String::new();
        for line in header.lines() {
            let _ = writeln!(out, "# {line}");
        }
        let _ = writeln!(
            out,
            "# criterion {}, start iteration {}, max iterations {}",
            self.criterion, self.start_iteration, self.max_iterations
        );

        for verdict in &self.verdicts {
            let iteration = verdict.iteration;
            let _ = writeln!(
                out,
                "\n== iteration {iteration} ({}) ==",
                verdict.outcome.as_str()
            );
            let _ = writeln!(
                out,
                "{:<16} {:>5} {:>14} {:>14} {:>14} {:>14}",
                "quantity", "zone", "value", "mean", "variance", "error"
            );
            for (q, quantity) in self.quantities.iter().enumerate() {
                for zone in 0..self.zones {
                    let error = if iteration < self.start_iteration {
                        f64::NAN
                    } else {
                        self.check_pair(q, iteration, zone).error
                    };
                    let _ = writeln!(
                        out,
                        "{:<16} {:>5} {:>14} {:>14} {:>14} {:>14}",
                        quantity.name,
                        zone,
                        format_slot(self.records.get(q, iteration, zone, Stat::Value)),
                        format_slot(self.records.get(q, iteration, zone, Stat::Mean)),
                        format_slot(self.records.get(q, iteration, zone, Stat::Variance)),
                        format_slot(error),
                    );
                }
            }
        }
        out
    }

    /// Rewrite the diagnostics file at `path`.
    pub fn write_diagnostics(&self, path: &Path, header: &str) -> DomainResult<()> {
        std::fs::write(path, self.render_diagnostics(header))?;
        Ok(())
    }
}

fn format_slot(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.6e}")
    }
}
