//! Configuration loading using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables prefixed with `POWER_BENCH_`, nested keys separated by `__`
//!
//! Every section has defaults, so an empty file is a valid configuration.
//!
//! # Example
//! ```no_run
//! use power_bench::config::BenchConfig;
//!
//! let config = BenchConfig::load_from("config/power_bench.toml")?;
//! config.validate()?;
//! println!("Voltage: {} V", config.monitor.voltage);
//! # Ok::<(), power_bench::error::BenchError>(())
//! ```
//!
//! Override a nested value from the environment:
//! `POWER_BENCH_ACQUISITION__MIN_SAMPLE_PERCENT=90`

use crate::acquisition::{AcquisitionConfig, MeasurementRequest, MonitorSettings};
use crate::error::{BenchError, BenchResult};
use crate::validator::ScenarioCriteria;
use crate::window::MeasurementWindow;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "POWER_BENCH_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Name and log level
    pub application: ApplicationConfig,
    /// Monitor output settings
    pub monitor: MonitorSettings,
    /// Timing of the hardware measurement
    pub measurement: MeasurementConfig,
    /// Retry/recovery limits
    pub acquisition: AcquisitionConfig,
    /// Scenario windows within one run
    pub windows: Vec<MeasurementWindow>,
    /// `scenario -> metric -> threshold`
    pub criteria: BTreeMap<String, ScenarioCriteria>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Label used in logs
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "power_bench".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Measurement timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Sampling frequency in Hz
    pub frequency_hz: f64,
    /// Measured duration in seconds
    pub duration_sec: f64,
    /// Lead-in captured before the measured duration, in seconds
    pub offset_sec: f64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 500.0,
            duration_sec: 60.0,
            offset_sec: 0.0,
        }
    }
}

impl MeasurementConfig {
    /// Request handed to the monitor.
    pub fn request(&self) -> MeasurementRequest {
        MeasurementRequest::new(self.frequency_hz, self.duration_sec, self.offset_sec)
    }
}

impl BenchConfig {
    /// Load configuration from a TOML file and `POWER_BENCH_*` environment variables
    pub fn load_from<P: AsRef<Path>>(path: P) -> BenchResult<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration using a custom environment prefix
    pub fn load_with_prefix<P: AsRef<Path>>(path: P, env_prefix: &str) -> BenchResult<Self> {
        let config = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> BenchResult<()> {
        let invalid = |message: String| Err(BenchError::Configuration(message));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if !(self.monitor.voltage > 0.0) {
            return invalid(format!("monitor.voltage must be positive, got {}", self.monitor.voltage));
        }
        if !(self.monitor.max_current > 0.0) {
            return invalid(format!(
                "monitor.max_current must be positive, got {}",
                self.monitor.max_current
            ));
        }

        let m = &self.measurement;
        if !(m.frequency_hz > 0.0) {
            return invalid(format!("measurement.frequency_hz must be positive, got {}", m.frequency_hz));
        }
        if !(m.duration_sec > 0.0) {
            return invalid(format!("measurement.duration_sec must be positive, got {}", m.duration_sec));
        }
        if !(m.offset_sec >= 0.0) {
            return invalid(format!("measurement.offset_sec must not be negative, got {}", m.offset_sec));
        }

        let a = &self.acquisition;
        if a.measurement_retry_limit == 0 {
            return invalid("acquisition.measurement_retry_limit must be at least 1".to_string());
        }
        if a.recovery_retry_limit == 0 {
            return invalid("acquisition.recovery_retry_limit must be at least 1".to_string());
        }
        if !(a.min_sample_percent > 0.0 && a.min_sample_percent <= 100.0) {
            return invalid(format!(
                "acquisition.min_sample_percent must be in (0, 100], got {}",
                a.min_sample_percent
            ));
        }

        let mut names = HashSet::new();
        for window in &self.windows {
            if !names.insert(&window.name) {
                return Err(BenchError::DuplicateWindow(window.name.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = BenchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.acquisition.recovery_backoff, Duration::from_secs(300));
        assert_eq!(config.monitor.voltage, 4.2);
        assert!(config.windows.is_empty());
    }

    #[test]
    fn invalid_log_level() {
        let mut config = BenchConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(BenchError::Configuration(_))));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = BenchConfig::default();
        config.acquisition.min_sample_percent = 120.0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.acquisition.recovery_retry_limit = 0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.measurement.frequency_hz = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.monitor.voltage = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_window_names() {
        let mut config = BenchConfig::default();
        config.windows = vec![
            MeasurementWindow::new("idle", 0.0, 1000.0),
            MeasurementWindow::new("idle", 2000.0, 3000.0),
        ];
        assert!(matches!(config.validate(), Err(BenchError::DuplicateWindow(_))));
    }

    #[test]
    fn measurement_request() {
        let config = MeasurementConfig {
            frequency_hz: 100.0,
            duration_sec: 5.0,
            offset_sec: 1.0,
        };
        assert_eq!(config.request().expected_samples(), 600.0);
    }
}
