//! Streaming statistics over a current-sample sequence.
//!
//! [`CurrentAggregator`] is fed one sample at a time in timestamp order. Each
//! [`update`](CurrentAggregator::update) is O(1) and only touches the running count,
//! sum, sum of squares and the max/min trackers. Results are computed on read and
//! never cached, so repeated reads always reflect the accumulated state.
//!
//! All derived values are [`Metric`]s: currents in milliamps, power in milliwatts.
//! An aggregator that saw no samples reports zero-valued metrics rather than
//! errors; [`AggregatedMetrics::sample_count`] lets downstream consumers tell an
//! empty window apart from a quiet one.

use crate::units::Metric;
use serde::{Deserialize, Serialize};

/// Names under which [`AggregatedMetrics`] exposes its values.
pub const METRIC_NAMES: [&str; 5] = [
    "avg_current",
    "max_current",
    "min_current",
    "stdev_current",
    "avg_power",
];

/// Incremental mean/max/min/stdev over currents in amps.
#[derive(Debug, Clone)]
pub struct CurrentAggregator {
    voltage: f64,
    count: u64,
    sum: f64,
    sum_squares: f64,
    max: f64,
    min: f64,
}

impl CurrentAggregator {
    /// Create an aggregator; `voltage` (volts) is used to derive average power.
    pub fn new(voltage: f64) -> Self {
        Self {
            voltage,
            count: 0,
            sum: 0.0,
            sum_squares: 0.0,
            max: f64::NEG_INFINITY,
            min: f64::INFINITY,
        }
    }

    /// Accumulate one current sample in amps.
    pub fn update(&mut self, current_amps: f64) {
        self.count += 1;
        self.sum += current_amps;
        self.sum_squares += current_amps * current_amps;
        self.max = self.max.max(current_amps);
        self.min = self.min.min(current_amps);
    }

    /// Number of samples observed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Reference voltage for power, in volts.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    fn mean_amps(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Mean current in mA (0 before the first sample).
    pub fn avg_current(&self) -> Metric {
        Metric::milliamps(self.mean_amps() * 1000.0).named("avg_current")
    }

    /// Largest sample in mA (0 before the first sample).
    pub fn max_current(&self) -> Metric {
        let amps = if self.count == 0 { 0.0 } else { self.max };
        Metric::milliamps(amps * 1000.0).named("max_current")
    }

    /// Smallest sample in mA (0 before the first sample).
    pub fn min_current(&self) -> Metric {
        let amps = if self.count == 0 { 0.0 } else { self.min };
        Metric::milliamps(amps * 1000.0).named("min_current")
    }

    /// Sample standard deviation.
    ///
    /// The variance is formed from amp-unit sums and the amp-unit mean; only the
    /// final value is scaled to milliamps.
    pub fn stdev_current(&self) -> Metric {
        let amps = if self.count < 2 {
            0.0
        } else {
            let n = self.count as f64;
            let mean = self.mean_amps();
            // rounding can push the numerator slightly below zero for constant input
            let variance = ((self.sum_squares - n * mean * mean) / (n - 1.0)).max(0.0);
            variance.sqrt()
        };
        Metric::milliamps(amps * 1000.0).named("stdev_current")
    }

    /// Average current times the reference voltage.
    pub fn avg_power(&self) -> Metric {
        let watts = self.mean_amps() * self.voltage;
        Metric::milliwatts(watts * 1000.0).named("avg_power")
    }

    /// Snapshot of all derived metrics.
    pub fn metrics(&self) -> AggregatedMetrics {
        AggregatedMetrics {
            avg_current: self.avg_current(),
            max_current: self.max_current(),
            min_current: self.min_current(),
            stdev_current: self.stdev_current(),
            avg_power: self.avg_power(),
            sample_count: self.count,
        }
    }
}

/// Final metrics for one measurement window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Mean current, mA
    pub avg_current: Metric,
    /// Largest sample, mA
    pub max_current: Metric,
    /// Smallest sample, mA
    pub min_current: Metric,
    /// Sample standard deviation, mA
    pub stdev_current: Metric,
    /// Mean current times reference voltage, mW
    pub avg_power: Metric,
    /// Samples that fell into the window
    pub sample_count: u64,
}

impl AggregatedMetrics {
    /// Look up a metric by its configuration name.
    pub fn get(&self, name: &str) -> Option<&Metric> {
        match name {
            "avg_current" => Some(&self.avg_current),
            "max_current" => Some(&self.max_current),
            "min_current" => Some(&self.min_current),
            "stdev_current" => Some(&self.stdev_current),
            "avg_power" => Some(&self.avg_power),
            _ => None,
        }
    }

    /// `(name, metric)` pairs in [`METRIC_NAMES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Metric)> {
        METRIC_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|metric| (*name, metric)))
    }

    /// Whether the window saw no samples.
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMPS: [f64; 10] = [1.64, 2.98, 1.72, 3.45, 1.31, 4.78, 3.43, 0.61, 1.19, 1.03];

    fn close(actual: f64, expected: f64, tolerance: f64) -> bool {
        (actual - expected).abs() < tolerance
    }

    #[test]
    fn empty_aggregator_reports_zeroes() {
        let metrics = CurrentAggregator::new(4.2).metrics();
        assert!(metrics.is_empty());
        for (name, metric) in metrics.iter() {
            assert_eq!(metric.value, 0.0, "{name} should be zero");
        }
    }

    #[test]
    fn single_sample_has_zero_stdev() {
        let mut aggregator = CurrentAggregator::new(4.2);
        aggregator.update(1.25);
        assert_eq!(aggregator.stdev_current().value, 0.0);
        assert!(close(aggregator.avg_current().value, 1250.0, 1e-9));
        assert!(close(aggregator.max_current().value, 1250.0, 1e-9));
        assert!(close(aggregator.min_current().value, 1250.0, 1e-9));
    }

    #[test]
    fn reference_dataset_statistics() {
        let mut aggregator = CurrentAggregator::new(4.2);
        for amps in AMPS {
            aggregator.update(amps);
        }
        let metrics = aggregator.metrics();
        assert_eq!(metrics.sample_count, 10);
        assert!(close(metrics.avg_current.value, 2214.0, 1e-6));
        assert!(close(metrics.max_current.value, 4780.0, 1e-6));
        assert!(close(metrics.min_current.value, 610.0, 1e-6));
        assert!(close(metrics.stdev_current.value, 1357.753, 1e-2));
        assert!(close(metrics.avg_power.value, 2.214 * 4.2 * 1000.0, 1e-6));
        assert_eq!(metrics.avg_power.unit, "mW");
    }

    #[test]
    fn stdev_matches_closed_form() {
        let data = [0.1, 0.4, 0.35, 0.2];
        let mut aggregator = CurrentAggregator::new(1.0);
        for amps in data {
            aggregator.update(amps);
        }
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let variance =
            data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
        assert!(close(
            aggregator.stdev_current().value,
            variance.sqrt() * 1000.0,
            1e-9
        ));
    }

    #[test]
    fn constant_input_never_yields_nan() {
        let mut aggregator = CurrentAggregator::new(3.8);
        for _ in 0..1000 {
            aggregator.update(0.1);
        }
        let stdev = aggregator.stdev_current().value;
        assert!(stdev.is_finite());
        assert!(stdev < 1e-3);
    }

    #[test]
    fn reads_are_repeatable_and_track_updates() {
        let mut aggregator = CurrentAggregator::new(4.0);
        aggregator.update(1.0);
        let first = aggregator.avg_current().value;
        assert_eq!(first, aggregator.avg_current().value);
        aggregator.update(3.0);
        assert!(close(aggregator.avg_current().value, 2000.0, 1e-9));
    }

    #[test]
    fn lookup_by_name() {
        let metrics = CurrentAggregator::new(4.2).metrics();
        assert!(metrics.get("avg_power").is_some());
        assert!(metrics.get("median_current").is_none());
        assert_eq!(metrics.iter().count(), METRIC_NAMES.len());
    }
}
