//! Dense convergence records and the running statistics kept in them.
//!
//! Records are a flat `Vec<f64>` indexed `[quantity][iteration][zone][stat]`.
//! Unfilled slots hold NaN so they can never be mistaken for a computed zero.

use crate::domain::errors::{DomainError, DomainResult};

/// Statistic slot within one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// Raw value read this iteration.
    Value = 0,
    /// Running mean.
    Mean = 1,
    /// Running sample variance.
    Variance = 2,
    /// Running median.
    Median = 3,
    /// Half the 16th-84th percentile spread.
    HalfSpread = 4,
}

impl Stat {
    /// Number of slots per record.
    pub const COUNT: usize = 5;
}

/// Statistics of one (quantity, zone) history at one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    /// Values since the start iteration.
    pub samples: usize,
    /// Mean since the start iteration.
    pub mean: f64,
    /// Unbiased sample variance; +inf below two samples.
    pub variance: f64,
    /// Median since the start iteration.
    pub median: f64,
    /// Half the 16th-84th percentile spread.
    pub half_spread: f64,
}

/// The per-run record array.
#[derive(Debug, Clone)]
pub struct IterationRecords {
    quantities: usize,
    iterations: usize,
    zones: usize,
    data: Vec<f64>,
}

impl IterationRecords {
    /// NaN-filled records for the given dimensions.
    pub fn new(quantities: usize, iterations: usize, zones: usize) -> Self {
        Self {
            quantities,
            iterations,
            zones,
            data: vec![f64::NAN; quantities * iterations * zones * Stat::COUNT],
        }
    }

    /// Number of iteration slots.
    pub const fn capacity(&self) -> usize {
        self.iterations
    }

    /// Number of zones.
    pub const fn zones(&self) -> usize {
        self.zones
    }

    /// Number of tracked quantities.
    pub const fn quantities(&self) -> usize {
        self.quantities
    }

    /// Reject an iteration index past the capacity.
    pub fn check_iteration(&self, iteration: usize) -> DomainResult<()> {
        if iteration >= self.iterations {
            return Err(DomainError::IterationOutOfRange {
                iteration,
                capacity: self.iterations,
            });
        }
        Ok(())
    }

    const fn offset(&self, quantity: usize, iteration: usize, zone: usize, stat: Stat) -> usize {
        ((quantity * self.iterations + iteration) * self.zones + zone) * Stat::COUNT + stat as usize
    }

    /// Read one slot. Out-of-range indices read as unfilled.
    pub fn get(&self, quantity: usize, iteration: usize, zone: usize, stat: Stat) -> f64 {
        if quantity >= self.quantities || iteration >= self.iterations || zone >= self.zones {
            return f64::NAN;
        }
        self.data[self.offset(quantity, iteration, zone, stat)]
    }

    /// Store one slot.
    pub fn set(&mut self, quantity: usize, iteration: usize, zone: usize, stat: Stat, value: f64) {
        let offset = self.offset(quantity, iteration, zone, stat);
        self.data[offset] = value;
    }

    /// True once a raw value was stored for the slot.
    pub fn is_filled(&self, quantity: usize, iteration: usize, zone: usize) -> bool {
        !self.get(quantity, iteration, zone, Stat::Value).is_nan()
    }

    /// Filled raw values for iterations `from..=to`, oldest first.
    pub fn history(&self, quantity: usize, zone: usize, from: usize, to: usize) -> Vec<f64> {
        (from..=to.min(self.iterations.saturating_sub(1)))
            .map(|iteration| self.get(quantity, iteration, zone, Stat::Value))
            .filter(|value| !value.is_nan())
            .collect()
    }

    /// Store the statistics slots of one record.
    pub fn store_stats(&mut self, quantity: usize, iteration: usize, zone: usize, stats: RunningStats) {
        self.set(quantity, iteration, zone, Stat::Mean, stats.mean);
        self.set(quantity, iteration, zone, Stat::Variance, stats.variance);
        self.set(quantity, iteration, zone, Stat::Median, stats.median);
        self.set(quantity, iteration, zone, Stat::HalfSpread, stats.half_spread);
    }
}

/// Mean and unbiased sample variance via Welford's recurrence.
///
/// The mean update `m += (x - m) / n` is the cumulative-mean recurrence
/// rearranged. Variance is `+inf` below two samples.
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (index, &value) in values.iter().enumerate() {
        let n = (index + 1) as f64;
        let delta = value - mean;
        mean += delta / n;
        m2 += delta * (value - mean);
    }
    let variance = if values.len() < 2 {
        f64::INFINITY
    } else {
        m2 / (values.len() - 1) as f64
    };
    if values.is_empty() {
        (f64::NAN, variance)
    } else {
        (mean, variance)
    }
}

/// Percentile of an ascending slice with linear interpolation between ranks.
pub fn percentile(sorted: &[f64], percent: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let rank = percent / 100.0 * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(len - 1);
            let fraction = rank - lower as f64;
            (sorted[upper] - sorted[lower]).mul_add(fraction, sorted[lower])
        }
    }
}

/// Every statistic the criteria read, computed over a post-start history.
pub fn running_stats(history: &[f64]) -> RunningStats {
    let (mean, variance) = mean_and_variance(history);
    let mut sorted = history.to_vec();
    sorted.sort_by(f64::total_cmp);
    RunningStats {
        samples: history.len(),
        mean,
        variance,
        median: percentile(&sorted, 50.0),
        half_spread: 0.5 * (percentile(&sorted, 84.0) - percentile(&sorted, 16.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfilled_slots_are_nan() {
        let records = IterationRecords::new(1, 3, 2);
        assert!(records.get(0, 1, 1, Stat::Value).is_nan());
        assert!(!records.is_filled(0, 0, 0));
        assert!(records.get(5, 0, 0, Stat::Mean).is_nan());
    }

    #[test]
    fn slots_do_not_alias() {
        let mut records = IterationRecords::new(2, 3, 2);
        records.set(1, 2, 1, Stat::Variance, 4.0);
        records.set(0, 2, 1, Stat::Variance, 1.0);
        records.set(1, 1, 1, Stat::Variance, 2.0);
        assert_eq!(records.get(1, 2, 1, Stat::Variance), 4.0);
        assert!(records.get(1, 2, 1, Stat::Mean).is_nan());
        assert!(records.get(1, 2, 0, Stat::Variance).is_nan());
    }

    #[test]
    fn history_skips_unfilled_iterations() {
        let mut records = IterationRecords::new(1, 5, 1);
        records.set(0, 1, 0, Stat::Value, 1.0);
        records.set(0, 3, 0, Stat::Value, 3.0);
        assert_eq!(records.history(0, 0, 0, 4), vec![1.0, 3.0]);
        assert_eq!(records.history(0, 0, 2, 10), vec![3.0]);
    }

    #[test]
    fn out_of_range_iteration_is_rejected() {
        let records = IterationRecords::new(1, 3, 1);
        assert!(records.check_iteration(2).is_ok());
        assert!(matches!(
            records.check_iteration(3),
            Err(DomainError::IterationOutOfRange {
                iteration: 3,
                capacity: 3
            })
        ));
    }

    #[test]
    fn variance_is_infinite_below_two_samples() {
        let (mean, variance) = mean_and_variance(&[4.0]);
        assert_eq!(mean, 4.0);
        assert!(variance.is_infinite());
    }

    #[test]
    fn unbiased_sample_variance() {
        let (mean, variance) = mean_and_variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((mean - 5.0).abs() < 1e-12);
        assert!((variance - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn constant_history_has_exactly_zero_variance() {
        let (mean, variance) = mean_and_variance(&[0.1, 0.1, 0.1, 0.1]);
        assert_eq!(mean, 0.1);
        assert_eq!(variance, 0.0);
    }

    #[test]
    fn percentiles_interpolate_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&sorted, 50.0) - 2.5).abs() < 1e-12);
        assert!((percentile(&sorted, 16.0) - 1.48).abs() < 1e-12);
        assert!((percentile(&sorted, 84.0) - 3.52).abs() < 1e-12);
        assert_eq!(percentile(&[7.0], 84.0), 7.0);
    }

    #[test]
    fn running_stats_collects_every_slot() {
        let stats = running_stats(&[3.0, 1.0, 2.0]);
        assert_eq!(stats.samples, 3);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert!((stats.variance - 1.0).abs() < 1e-12);
        assert!((stats.median - 2.0).abs() < 1e-12);
        assert!((stats.half_spread - 0.68).abs() < 1e-12);
    }
}
