//! Bounded-retry acquisition of raw current samples.
//!
//! One acquisition cycle drives the current monitor through an explicit state
//! machine ([`AcquisitionState`]): prepare the link, measure, and on a link failure
//! run a recovery sub-loop before measuring again. The [`AcquisitionEngine`] owns
//! both collaborators for the whole cycle and always leaves the monitor
//! disconnected when it returns, whether the cycle succeeded, failed or was
//! canceled.
//!
//! # Limits
//!
//! | Parameter | Default | Meaning |
//! |---|---|---|
//! | `measurement_retry_limit` | 3 | measurement attempts per cycle |
//! | `recovery_retry_limit` | 3 | reconnect tries per recovery |
//! | `recovery_backoff` | 5m | sleep after each failed reconnect |
//! | `min_sample_percent` | 95 | sample floor, % of expected samples |

pub mod cancel;
pub mod engine;
pub mod state;

pub use crate::hardware::MeasurementRequest;
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use engine::AcquisitionEngine;
pub use state::AcquisitionState;

use crate::window::RawSample;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Retry and acceptance parameters of the acquisition loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Measurement attempts per cycle
    pub measurement_retry_limit: u32,
    /// Reconnect tries per recovery sub-loop
    pub recovery_retry_limit: u32,
    /// Sleep after each failed reconnect
    #[serde(with = "humantime_serde")]
    pub recovery_backoff: Duration,
    /// Share of the expected sample count a measurement must deliver
    pub min_sample_percent: f64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            measurement_retry_limit: 3,
            recovery_retry_limit: 3,
            recovery_backoff: Duration::from_secs(300),
            min_sample_percent: 95.0,
        }
    }
}

/// Monitor output settings applied on every (re)connect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Supply voltage in volts, also the reference voltage for power
    pub voltage: f64,
    /// Current limit in amps
    pub max_current: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            voltage: 4.2,
            max_current: 8.0,
        }
    }
}

/// How one measurement attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Enough samples; the cycle ends successfully.
    Accepted,
    /// Measurement finished cleanly below the sample floor.
    Insufficient,
    /// The monitor or device reported a hardware failure.
    HardwareError,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::Insufficient => "insufficient",
            AttemptOutcome::HardwareError => "hardware_error",
        };
        f.write_str(label)
    }
}

/// Diagnostic record of one measurement attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionAttempt {
    /// 1-based attempt number
    pub attempt_index: u32,
    /// Samples delivered, including partial samples from a failed attempt
    pub sample_count: usize,
    /// Attempt followed a recovery and skipped the counter reset
    pub recovered: bool,
    /// How the attempt ended
    pub outcome: AttemptOutcome,
    /// Hardware error text, if the attempt failed
    pub error: Option<String>,
}

impl fmt::Display for AcquisitionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} ({} samples, {}",
            self.attempt_index, self.sample_count, self.outcome
        )?;
        if self.recovered {
            f.write_str(", reconnect")?;
        }
        f.write_str(")")
    }
}

/// Bookkeeping of a finished acquisition cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionReport {
    /// Every attempt in order, the accepted one last
    pub attempts: Vec<AcquisitionAttempt>,
    /// Recoveries that re-established the link
    pub recovery_cycles: u32,
    /// Backoff sleeps taken after failed reconnects
    pub backoff_sleeps: u32,
}

/// Accepted samples of a successful cycle.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Samples of the accepted attempt
    pub samples: Vec<RawSample>,
    /// How the samples were obtained
    pub report: AcquisitionReport,
}
