//! Custom error types for the measurement pipeline.
//!
//! This module defines the primary error type, `BenchError`, for the whole crate.
//! Using the `thiserror` crate, it gives every stage of the pipeline (unit model,
//! threshold parsing, segmentation, acquisition, validation) one consistent error
//! surface that composes with the `?` operator.
//!
//! ## Error Categories
//!
//! - **Unit/threshold errors** (`IncompatibleUnit`, `UnitTypeMismatch`, `UnknownUnitType`,
//!   `MissingField`, `MalformedThreshold`): locally recoverable. The validator degrades
//!   them to "no assertion for this metric" and logs a warning.
//! - **Segmentation errors** (`MissingWindowBound`, `InvalidWindow`, `DuplicateWindow`):
//!   fatal for the affected scenario only.
//! - **Acquisition errors** (`AcquisitionExhausted`, `RecoveryExhausted`, `Canceled`):
//!   fatal for the whole acquisition cycle; the caller decides whether to abort the
//!   enclosing test.
//! - **Infrastructure errors** (`Hardware`, `SampleLog`, `Io`, `Config`, `Configuration`,
//!   `Serialization`): wrap collaborator and I/O failures.
//!
//! Hardware collaborators report failures with the structured [`HardwareError`], which
//! converts into `BenchError::Hardware` via `#[from]`.

use crate::acquisition::AcquisitionAttempt;
use thiserror::Error;

// =============================================================================
// Hardware Errors
// =============================================================================

/// Category of a hardware collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareErrorKind {
    /// The control link (serial/USB) dropped or returned garbage.
    Communication,
    /// The device did not answer in time.
    Timeout,
    /// The device reported an internal fault.
    Hardware,
    /// The device rejected a setting.
    Configuration,
    /// Anything not covered above.
    Unknown,
}

impl std::fmt::Display for HardwareErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HardwareErrorKind::Communication => "communication",
            HardwareErrorKind::Timeout => "timeout",
            HardwareErrorKind::Hardware => "hardware",
            HardwareErrorKind::Configuration => "configuration",
            HardwareErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// Failure reported by the current monitor or the device under test.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Device '{device}' {kind} error: {message}")]
pub struct HardwareError {
    /// Device that raised the error (e.g. "monitor", "dut")
    pub device: String,
    /// Failure category
    pub kind: HardwareErrorKind,
    /// Human-readable diagnostic text
    pub message: String,
}

impl HardwareError {
    /// Create a new hardware error.
    pub fn new(
        device: impl Into<String>,
        kind: HardwareErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a communication failure on the control link.
    pub fn communication(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(device, HardwareErrorKind::Communication, message)
    }
}

// =============================================================================
// Crate Error
// =============================================================================

/// Convenience alias for results using the crate error type.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Primary error type for the measurement pipeline.
#[derive(Error, Debug)]
pub enum BenchError {
    /// A unit string is not registered for the given unit type.
    #[error("Unit '{unit}' is not a registered {unit_type} unit")]
    IncompatibleUnit {
        /// Unit type the unit was looked up under
        unit_type: String,
        /// Offending unit string
        unit: String,
    },

    /// Arithmetic or comparison between metrics of different unit types.
    #[error("Cannot combine {left} metric with {right} metric")]
    UnitTypeMismatch {
        /// Unit type of the left operand
        left: String,
        /// Unit type of the right operand
        right: String,
    },

    /// A configured `unit_type` string names no known unit type.
    #[error("Unknown unit type '{0}'")]
    UnknownUnitType(String),

    /// A required threshold configuration key is absent.
    #[error("Threshold configuration is missing required field '{0}'")]
    MissingField(&'static str),

    /// Threshold configuration mixes or partially specifies limit styles.
    #[error("Malformed threshold configuration: {0}")]
    MalformedThreshold(String),

    /// A measurement window lacks its start or end timestamp.
    ///
    /// Signals an aborted or incomplete upstream test run rather than a silent zero result.
    #[error("Scenario '{scenario}' has no {bound} timestamp")]
    MissingWindowBound {
        /// Scenario name of the window
        scenario: String,
        /// Which bound is missing ("start" or "end")
        bound: &'static str,
    },

    /// A measurement window ends before it starts.
    #[error("Scenario '{scenario}' window is inverted: start {start_ms} ms > end {end_ms} ms")]
    InvalidWindow {
        /// Scenario name of the window
        scenario: String,
        /// Start timestamp in milliseconds
        start_ms: f64,
        /// End timestamp in milliseconds
        end_ms: f64,
    },

    /// Two measurement windows share one scenario name.
    #[error("Duplicate measurement window for scenario '{0}'")]
    DuplicateWindow(String),

    /// The measurement loop ran out of attempts without an acceptable sample set.
    #[error(
        "Acquisition failed after {attempts} attempt(s) [{}]{}",
        format_history(.history),
        .last_error.as_ref().map(|e| format!("; last error: {e}")).unwrap_or_default()
    )]
    AcquisitionExhausted {
        /// Number of measurement attempts made
        attempts: u32,
        /// Per-attempt diagnostics
        history: Vec<AcquisitionAttempt>,
        /// Text of the last hardware error, if any
        last_error: Option<String>,
    },

    /// The monitor link could not be re-established.
    #[error(
        "Monitor recovery failed after {attempts} attempt(s): {last_error} [{}]",
        format_history(.history)
    )]
    RecoveryExhausted {
        /// Number of recovery attempts made
        attempts: u32,
        /// Measurement attempts made before the link was lost for good
        history: Vec<AcquisitionAttempt>,
        /// Text of the last recovery failure
        last_error: String,
    },

    /// The acquisition was canceled; partial data was discarded.
    #[error("Acquisition canceled")]
    Canceled,

    /// A hardware collaborator failed outside the retry loop.
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// A raw sample log line could not be parsed.
    #[error("Sample log line {line}: {reason}")]
    SampleLog {
        /// 1-based line number
        line: usize,
        /// Parse failure description
        reason: String,
    },

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parsing failed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// JSON encoding of results failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BenchError {
    /// Whether the error only invalidates a single check or scenario.
    ///
    /// Unit and threshold malformation never aborts a run, and a bad window only
    /// loses its own scenario. Everything else is fatal for the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BenchError::IncompatibleUnit { .. }
                | BenchError::UnitTypeMismatch { .. }
                | BenchError::UnknownUnitType(_)
                | BenchError::MissingField(_)
                | BenchError::MalformedThreshold(_)
                | BenchError::MissingWindowBound { .. }
                | BenchError::InvalidWindow { .. }
        )
    }
}

fn format_history(history: &[AcquisitionAttempt]) -> String {
    history
        .iter()
        .map(|attempt| attempt.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
