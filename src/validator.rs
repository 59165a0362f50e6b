//! Threshold validation of aggregated metrics.
//!
//! A failing threshold is an ordinary [`Verdict::Fail`] value, never an error.
//! Malformed criteria (unknown metric name, missing `unit`, mixed limit styles,
//! unit type that does not match the metric) degrade to a skipped check and a
//! warning so that one bad entry cannot stop a run.
//!
//! # Verdicts
//!
//! | Situation | Verdict |
//! |---|---|
//! | any well-formed check failed | `Fail` |
//! | at least one check ran, all passed | `Pass` |
//! | no well-formed checks for the scenario | `Pass` (vacuous, see [`ValidationOutcome::is_vacuous`]) |
//! | criteria configured but the window saw no samples | `Skip` |
//! | criteria configured for a scenario with no metrics | `Skip` |

use crate::aggregator::AggregatedMetrics;
use crate::threshold::{Threshold, ThresholdConfig};
use crate::units::Metric;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Criteria of one scenario, keyed by metric name.
pub type ScenarioCriteria = BTreeMap<String, ThresholdConfig>;

/// Overall decision for a scenario or a suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every evaluated check held
    Pass,
    /// At least one check fell outside its band
    Fail,
    /// Nothing could be checked although criteria exist
    Skip,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Skip => write!(f, "SKIP"),
        }
    }
}

/// Result of checking one metric against its band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCheck {
    /// Metric name as configured
    pub metric: String,
    /// Whether `actual` lies within `threshold`
    pub passed: bool,
    /// Measured value
    pub actual: Metric,
    /// Band it was checked against
    pub threshold: Threshold,
}

/// A configured check that was not evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCheck {
    /// Metric name as configured, `*` for the whole scenario
    pub metric: String,
    /// Why the check did not run
    pub reason: String,
}

/// Validation result of one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Scenario name
    pub scenario: String,
    /// Overall decision
    pub verdict: Verdict,
    /// Checks that ran
    pub checks: Vec<MetricCheck>,
    /// Checks that did not run
    pub skipped: Vec<SkippedCheck>,
}

impl ValidationOutcome {
    /// Outcome of a scenario that could not be checked at all.
    pub fn skipped(scenario: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            verdict: Verdict::Skip,
            checks: Vec::new(),
            skipped: vec![SkippedCheck {
                metric: "*".to_string(),
                reason: reason.into(),
            }],
        }
    }

    /// Passed without evaluating a single check.
    ///
    /// "No criteria" is not the same as "verified good"; callers reporting results
    /// should surface this.
    pub fn is_vacuous(&self) -> bool {
        self.verdict == Verdict::Pass && self.checks.is_empty()
    }

    /// Checks that fell outside their band.
    pub fn failed_checks(&self) -> impl Iterator<Item = &MetricCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}: {} ({} checked, {} skipped)",
            self.scenario,
            self.verdict,
            self.checks.len(),
            self.skipped.len()
        );
        if self.is_vacuous() {
            summary.push_str(" [no criteria evaluated]");
        }
        for check in self.failed_checks() {
            summary.push_str(&format!(
                "; {} = {} outside {}",
                check.metric, check.actual, check.threshold
            ));
        }
        summary
    }
}

/// Validation result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteOutcome {
    /// Per-scenario outcomes sorted by scenario name
    pub outcomes: Vec<ValidationOutcome>,
    /// Worst scenario verdict
    pub verdict: Verdict,
    /// First scenario (by name) that carries the suite verdict
    pub first_failure: Option<String>,
}

impl SuiteOutcome {
    /// Combine scenario outcomes: `Fail` if any failed, else `Skip` if any was
    /// skipped, else `Pass`.
    pub fn from_outcomes(mut outcomes: Vec<ValidationOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.scenario.cmp(&b.scenario));
        let verdict = if outcomes.iter().any(|o| o.verdict == Verdict::Fail) {
            Verdict::Fail
        } else if outcomes.iter().any(|o| o.verdict == Verdict::Skip) {
            Verdict::Skip
        } else {
            Verdict::Pass
        };
        let first_failure = match verdict {
            Verdict::Pass => None,
            worst => outcomes
                .iter()
                .find(|o| o.verdict == worst)
                .map(|o| o.scenario.clone()),
        };
        Self {
            outcomes,
            verdict,
            first_failure,
        }
    }

    /// Whether every scenario passed.
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Outcome of one scenario by name.
    pub fn get(&self, scenario: &str) -> Option<&ValidationOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }
}

fn skip(scenario: &str, metric: &str, reason: String, skipped: &mut Vec<SkippedCheck>) {
    warn!(scenario, metric, %reason, "skipping threshold check");
    skipped.push(SkippedCheck {
        metric: metric.to_string(),
        reason,
    });
}

/// Check one scenario's metrics against its criteria.
pub fn validate(
    scenario: &str,
    metrics: &AggregatedMetrics,
    criteria: &ScenarioCriteria,
) -> ValidationOutcome {
    if criteria.is_empty() {
        debug!(scenario, "no criteria configured");
        return ValidationOutcome {
            scenario: scenario.to_string(),
            verdict: Verdict::Pass,
            checks: Vec::new(),
            skipped: Vec::new(),
        };
    }

    if metrics.is_empty() {
        warn!(scenario, "window has no samples, skipping validation");
        return ValidationOutcome {
            scenario: scenario.to_string(),
            verdict: Verdict::Skip,
            checks: Vec::new(),
            skipped: criteria
                .keys()
                .map(|metric| SkippedCheck {
                    metric: metric.clone(),
                    reason: "window has no samples".to_string(),
                })
                .collect(),
        };
    }

    let mut checks = Vec::new();
    let mut skipped = Vec::new();
    for (name, config) in criteria {
        let Some(actual) = metrics.get(name) else {
            skip(scenario, name, format!("unknown metric '{name}'"), &mut skipped);
            continue;
        };
        let threshold = match Threshold::from_config(config) {
            Ok(threshold) => threshold,
            Err(err) => {
                skip(scenario, name, err.to_string(), &mut skipped);
                continue;
            }
        };
        let passed = match threshold.contains(actual) {
            Ok(passed) => passed,
            Err(err) => {
                skip(scenario, name, err.to_string(), &mut skipped);
                continue;
            }
        };
        if passed {
            debug!(scenario, metric = %name, actual = %actual, %threshold, "check passed");
        } else {
            info!(scenario, metric = %name, actual = %actual, %threshold, "check failed");
        }
        checks.push(MetricCheck {
            metric: name.clone(),
            passed,
            actual: actual.clone(),
            threshold,
        });
    }

    let verdict = if checks.iter().any(|check| !check.passed) {
        Verdict::Fail
    } else {
        Verdict::Pass
    };
    ValidationOutcome {
        scenario: scenario.to_string(),
        verdict,
        checks,
        skipped,
    }
}

/// Validate every scenario that has metrics or criteria.
///
/// Scenarios with metrics but no criteria pass vacuously; scenarios with criteria
/// but no metrics are skipped, which fails the suite.
pub fn validate_all(
    metrics: &HashMap<String, AggregatedMetrics>,
    criteria: &BTreeMap<String, ScenarioCriteria>,
) -> SuiteOutcome {
    let empty = ScenarioCriteria::new();
    let scenarios: BTreeSet<&String> = metrics.keys().chain(criteria.keys()).collect();
    let outcomes = scenarios
        .into_iter()
        .map(|scenario| match metrics.get(scenario) {
            Some(m) => validate(scenario, m, criteria.get(scenario).unwrap_or(&empty)),
            None => {
                warn!(scenario = %scenario, "criteria configured but no metrics collected");
                ValidationOutcome::skipped(scenario.as_str(), "no metrics for scenario")
            }
        })
        .collect();
    let suite = SuiteOutcome::from_outcomes(outcomes);
    match &suite.first_failure {
        Some(scenario) => info!(verdict = %suite.verdict, first_failure = %scenario, "validation finished"),
        None => info!(verdict = %suite.verdict, "validation finished"),
    }
    suite
}
