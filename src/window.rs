//! Time-window segmentation of a continuous sample stream.
//!
//! A test run produces one long `(timestamp, current)` stream; each scenario of the
//! run owns a named `[start, end]` interval within it. [`segment`] feeds every sample
//! into the [`CurrentAggregator`] of each window whose closed interval contains it,
//! so overlapping windows share samples. Windows are aggregated independently and
//! samples keep their original order within each window.
//!
//! Window bounds are supplied in milliseconds and compared against sample
//! timestamps in seconds.

use crate::aggregator::{AggregatedMetrics, CurrentAggregator};
use crate::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One current monitor reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Seconds since the start of the measurement
    pub timestamp_sec: f64,
    /// Instantaneous current in amps
    pub current_amps: f64,
}

impl RawSample {
    /// Sample at `timestamp_sec` seconds drawing `current_amps` amps.
    pub fn new(timestamp_sec: f64, current_amps: f64) -> Self {
        Self {
            timestamp_sec,
            current_amps,
        }
    }
}

/// Named interval of one scenario within a test run.
///
/// Bounds are optional because they are parsed from external run logs; an aborted
/// run may never have logged its end marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementWindow {
    /// Scenario the window belongs to
    pub name: String,
    /// Start of the scenario, ms since the start of the run
    #[serde(default)]
    pub start_ms: Option<f64>,
    /// End of the scenario, ms since the start of the run
    #[serde(default)]
    pub end_ms: Option<f64>,
}

impl MeasurementWindow {
    /// Window with both bounds known.
    pub fn new(name: impl Into<String>, start_ms: f64, end_ms: f64) -> Self {
        Self {
            name: name.into(),
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }

    /// Resolve the interval in seconds, checking both bounds are present and ordered.
    pub fn bounds_sec(&self) -> BenchResult<(f64, f64)> {
        let start_ms = self.start_ms.ok_or_else(|| BenchError::MissingWindowBound {
            scenario: self.name.clone(),
            bound: "start",
        })?;
        let end_ms = self.end_ms.ok_or_else(|| BenchError::MissingWindowBound {
            scenario: self.name.clone(),
            bound: "end",
        })?;
        if start_ms > end_ms {
            return Err(BenchError::InvalidWindow {
                scenario: self.name.clone(),
                start_ms,
                end_ms,
            });
        }
        Ok((start_ms / 1000.0, end_ms / 1000.0))
    }
}

struct ActiveWindow<'a> {
    name: &'a str,
    start: f64,
    end: f64,
    aggregator: CurrentAggregator,
}

fn check_unique(windows: &[MeasurementWindow]) -> BenchResult<()> {
    let mut seen = HashSet::new();
    for window in windows {
        if !seen.insert(window.name.as_str()) {
            return Err(BenchError::DuplicateWindow(window.name.clone()));
        }
    }
    Ok(())
}

fn aggregate<'a>(
    samples: &[RawSample],
    windows: Vec<ActiveWindow<'a>>,
) -> impl Iterator<Item = (String, AggregatedMetrics)> + 'a {
    let mut windows = windows;
    for sample in samples {
        for window in windows.iter_mut() {
            if window.start <= sample.timestamp_sec && sample.timestamp_sec <= window.end {
                window.aggregator.update(sample.current_amps);
            }
        }
    }
    windows.into_iter().map(|window| {
        let metrics = window.aggregator.metrics();
        debug!(
            scenario = window.name,
            samples = metrics.sample_count,
            "window aggregated"
        );
        if metrics.is_empty() {
            warn!(scenario = window.name, "no samples fell inside window");
        }
        (window.name.to_string(), metrics)
    })
}

/// Aggregate `samples` per window; any missing or inverted bound fails the whole call.
pub fn segment(
    samples: &[RawSample],
    windows: &[MeasurementWindow],
    voltage: f64,
) -> BenchResult<HashMap<String, AggregatedMetrics>> {
    check_unique(windows)?;
    let active = windows
        .iter()
        .map(|window| {
            let (start, end) = window.bounds_sec()?;
            Ok(ActiveWindow {
                name: &window.name,
                start,
                end,
                aggregator: CurrentAggregator::new(voltage),
            })
        })
        .collect::<BenchResult<Vec<_>>>()?;
    Ok(aggregate(samples, active).collect())
}

/// Aggregate `samples` per window, failing only the scenarios whose bounds are bad.
pub fn segment_partial(
    samples: &[RawSample],
    windows: &[MeasurementWindow],
    voltage: f64,
) -> BenchResult<HashMap<String, BenchResult<AggregatedMetrics>>> {
    check_unique(windows)?;
    let mut results = HashMap::with_capacity(windows.len());
    let mut active = Vec::with_capacity(windows.len());
    for window in windows {
        match window.bounds_sec() {
            Ok((start, end)) => active.push(ActiveWindow {
                name: &window.name,
                start,
                end,
                aggregator: CurrentAggregator::new(voltage),
            }),
            Err(err) => {
                warn!(scenario = %window.name, error = %err, "skipping window");
                results.insert(window.name.clone(), Err(err));
            }
        }
    }
    results.extend(aggregate(samples, active).map(|(name, metrics)| (name, Ok(metrics))));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMPS: [f64; 10] = [1.64, 2.98, 1.72, 3.45, 1.31, 4.78, 3.43, 0.61, 1.19, 1.03];

    fn one_hertz(amps: &[f64]) -> Vec<RawSample> {
        amps.iter()
            .enumerate()
            .map(|(i, a)| RawSample::new(i as f64, *a))
            .collect()
    }

    #[test]
    fn reference_window_matches_dataset() {
        let samples = one_hertz(&AMPS);
        let windows = [MeasurementWindow::new("test_case", 0.0, 10_000.0)];
        let metrics = segment(&samples, &windows, 4.2).unwrap();
        let m = &metrics["test_case"];
        assert_eq!(m.sample_count, 10);
        assert!((m.avg_current.value - 2214.0).abs() < 1e-6);
        assert!((m.stdev_current.value - 1357.75).abs() < 1e-1);
    }

    #[test]
    fn overlapping_windows_share_samples() {
        let samples = one_hertz(&AMPS);
        let windows = [
            MeasurementWindow::new("first", 0.0, 5_000.0),
            MeasurementWindow::new("second", 5_000.0, 9_000.0),
            MeasurementWindow::new("all", 0.0, 9_000.0),
        ];
        let metrics = segment(&samples, &windows, 4.2).unwrap();
        // t=5s is on both closed boundaries
        assert_eq!(metrics["first"].sample_count, 6);
        assert_eq!(metrics["second"].sample_count, 5);
        assert_eq!(metrics["all"].sample_count, 10);
        assert!((metrics["first"].max_current.value - 4780.0).abs() < 1e-9);
        assert!((metrics["second"].max_current.value - 4780.0).abs() < 1e-9);
    }

    #[test]
    fn missing_bound_fails_segment() {
        let samples = one_hertz(&AMPS);
        let windows = [
            MeasurementWindow::new("ok", 0.0, 1_000.0),
            MeasurementWindow {
                name: "aborted".into(),
                start_ms: Some(2_000.0),
                end_ms: None,
            },
        ];
        let err = segment(&samples, &windows, 4.2).unwrap_err();
        assert!(matches!(
            err,
            BenchError::MissingWindowBound { ref scenario, bound: "end" } if scenario == "aborted"
        ));
    }

    #[test]
    fn partial_segment_isolates_bad_window() {
        let samples = one_hertz(&AMPS);
        let windows = [
            MeasurementWindow::new("ok", 0.0, 1_000.0),
            MeasurementWindow {
                name: "aborted".into(),
                start_ms: None,
                end_ms: Some(3_000.0),
            },
            MeasurementWindow::new("inverted", 3_000.0, 1_000.0),
        ];
        let results = segment_partial(&samples, &windows, 4.2).unwrap();
        assert_eq!(results["ok"].as_ref().unwrap().sample_count, 2);
        assert!(matches!(
            results["aborted"],
            Err(BenchError::MissingWindowBound { bound: "start", .. })
        ));
        assert!(matches!(
            results["inverted"],
            Err(BenchError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn window_outside_stream_is_empty() {
        let samples = one_hertz(&AMPS);
        let windows = [MeasurementWindow::new("late", 60_000.0, 70_000.0)];
        let metrics = segment(&samples, &windows, 4.2).unwrap();
        assert!(metrics["late"].is_empty());
        assert_eq!(metrics["late"].avg_current.value, 0.0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let windows = [
            MeasurementWindow::new("idle", 0.0, 1.0),
            MeasurementWindow::new("idle", 2.0, 3.0),
        ];
        assert!(matches!(
            segment(&[], &windows, 4.2),
            Err(BenchError::DuplicateWindow(_))
        ));
    }
}
