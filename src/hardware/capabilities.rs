//! Collaborator capabilities used by the acquisition engine.
//!
//! The engine never talks to hardware directly. It drives two collaborators:
//!
//! - [`CurrentMonitor`]: the external current/power monitor on the serial/USB
//!   control link (connect, configure, run a timed measurement).
//! - [`DeviceUnderTest`]: the device whose draw is being measured (reset its
//!   measurable counters, re-enable its data channel after a link failure).
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Takes `&mut self`: the engine holds exclusive access for a whole acquisition
//! - Reports failures as [`HardwareError`] so the retry loop can reason about them
//!
//! # Example
//!
//! ```rust,ignore
//! struct SerialMonitor { port: SerialStream }
//!
//! #[async_trait]
//! impl CurrentMonitor for SerialMonitor {
//!     async fn connect(&mut self) -> Result<(), HardwareError> {
//!         self.port.write_all(b"HELLO\n").await.map_err(|e| {
//!             HardwareError::communication("monitor", e.to_string())
//!         })
//!     }
//!     // ...
//! }
//! ```

use crate::error::HardwareError;
use crate::window::RawSample;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Timing of one hardware measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequest {
    /// Sampling frequency in Hz
    pub frequency_hz: f64,
    /// Measured duration in seconds
    pub duration_sec: f64,
    /// Extra lead-in captured before the measured duration, in seconds
    #[serde(default)]
    pub offset_sec: f64,
}

impl MeasurementRequest {
    /// Request `duration_sec` plus `offset_sec` seconds at `frequency_hz`.
    pub fn new(frequency_hz: f64, duration_sec: f64, offset_sec: f64) -> Self {
        Self {
            frequency_hz,
            duration_sec,
            offset_sec,
        }
    }

    /// `frequency * (duration + offset)`.
    pub fn expected_samples(&self) -> f64 {
        self.frequency_hz * (self.duration_sec + self.offset_sec)
    }

    /// Sample floor for a given acceptance percentage.
    pub fn min_required(&self, min_sample_percent: f64) -> f64 {
        self.expected_samples() * min_sample_percent / 100.0
    }
}

/// Samples returned by a completed measurement.
#[derive(Debug, Clone, Default)]
pub struct MeasurementHandle {
    samples: Vec<RawSample>,
}

impl MeasurementHandle {
    /// Wrap samples delivered by a monitor.
    pub fn new(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    /// Captured samples in arrival order.
    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    /// Take ownership of the samples.
    pub fn into_samples(self) -> Vec<RawSample> {
        self.samples
    }

    /// Number of captured samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean current over the measurement, in amps (0 when empty).
    pub fn average_current(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.current_amps).sum::<f64>() / self.samples.len() as f64
    }
}

/// A measurement interrupted by a hardware failure.
///
/// Carries whatever samples reached the host before the link dropped, so the
/// engine can decide whether they are enough to keep.
#[derive(Error, Debug, Clone)]
#[error("{error} ({} samples captured)", .partial.len())]
pub struct MeasurementFailure {
    /// Failure that ended the measurement
    pub error: HardwareError,
    /// Samples that arrived before the failure
    pub partial: Vec<RawSample>,
}

impl From<HardwareError> for MeasurementFailure {
    fn from(error: HardwareError) -> Self {
        Self {
            error,
            partial: Vec::new(),
        }
    }
}

/// Capability: timed current measurement over an unreliable control link.
#[async_trait]
pub trait CurrentMonitor: Send {
    /// Open the control link.
    async fn connect(&mut self) -> Result<(), HardwareError>;

    /// Close the control link and disarm any running measurement.
    ///
    /// Must be safe to call when already disconnected.
    async fn disconnect(&mut self) -> Result<(), HardwareError>;

    /// Set the supply voltage in volts.
    async fn set_voltage(&mut self, volts: f64) -> Result<(), HardwareError>;

    /// Set the current limit in amps.
    async fn set_max_current(&mut self, amps: f64) -> Result<(), HardwareError>;

    /// Run a measurement and return its samples.
    ///
    /// On a communication failure the error carries any samples captured so far.
    async fn start_measurement(
        &mut self,
        request: &MeasurementRequest,
    ) -> Result<MeasurementHandle, MeasurementFailure>;
}

/// Capability: the device being benchmarked.
#[async_trait]
pub trait DeviceUnderTest: Send {
    /// Reset the device's measurable counters before a fresh measurement.
    async fn reset_counters(&mut self) -> Result<(), HardwareError>;

    /// Re-enable the device's data channel after the monitor link was recovered.
    async fn reconnect(&mut self) -> Result<(), HardwareError>;
}
