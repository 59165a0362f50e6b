//! # Power Bench Core Library
//!
//! Acquisition, aggregation and threshold validation of device current/power draw,
//! measured by an external current monitor over an unreliable control link.
//!
//! ## Pipeline
//!
//! ```text
//! AcquisitionEngine ──samples──> window::segment ──per scenario──> CurrentAggregator
//!                                                                       │
//!                                         ResultSink <──outcomes── validator::validate_all
//! ```
//!
//! ## Crate Structure
//!
//! - **`units`**: unit-tagged `Metric` values with conversion tables and checked arithmetic.
//! - **`threshold`**: threshold configuration parsing and pass bands.
//! - **`aggregator`**: streaming mean/max/min/stdev/power over current samples.
//! - **`window`**: raw samples, scenario windows, segmentation.
//! - **`sample_log`**: the monitor driver's two-column text log format.
//! - **`hardware`**: current monitor / device-under-test capability traits and mocks.
//! - **`acquisition`**: the bounded-retry acquisition state machine with cancellation.
//! - **`validator`**: pass/fail/skip verdicts per scenario and per run.
//! - **`sink`**: result sinks with explicit sequence numbering.
//! - **`config`**: figment-based configuration (TOML + `POWER_BENCH_*` environment).
//! - **`logging`**: tracing-subscriber initialization.
//! - **`error`**: the crate-wide `BenchError`.

pub mod acquisition;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod sample_log;
pub mod sink;
pub mod threshold;
pub mod units;
pub mod validator;
pub mod window;

pub use acquisition::{Acquisition, AcquisitionConfig, AcquisitionEngine, MonitorSettings};
pub use aggregator::{AggregatedMetrics, CurrentAggregator};
pub use error::{BenchError, BenchResult, HardwareError};
pub use threshold::{Threshold, ThresholdConfig};
pub use units::{Metric, UnitType};
pub use validator::{validate, validate_all, SuiteOutcome, ValidationOutcome, Verdict};
pub use window::{segment, segment_partial, MeasurementWindow, RawSample};
