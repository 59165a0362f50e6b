//! Pass/fail bands for metrics.
//!
//! Threshold configuration arrives as a loosely-typed map ([`ThresholdConfig`]) with
//! optional keys. [`ThresholdSpec::parse`] validates it at the boundary into a tagged
//! variant, either absolute bounds or expected value ± percent deviation, and
//! [`Threshold`] is the resolved band used for comparison.
//!
//! Validation order:
//! 1. `unit_type` and `unit` are required (`MissingField`).
//! 2. `unit_type` must be known and `unit` must belong to it.
//! 3. Exactly one limit style: absolute (`lower_limit` and/or `upper_limit`) or relative
//!    (`expected_value` AND `percent_deviation`). Mixing styles, a partial relative pair,
//!    or no limits at all is `MalformedThreshold`.
//! 4. A missing absolute bound defaults to `-inf` / `+inf`.

use crate::error::{BenchError, BenchResult};
use crate::units::{Metric, UnitType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw threshold configuration for one metric, as read from TOML/JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Unit type name ("current", "power", "time", "voltage")
    #[serde(default)]
    pub unit_type: Option<String>,
    /// Unit the limits are expressed in
    #[serde(default)]
    pub unit: Option<String>,
    /// Inclusive lower bound (absolute style)
    #[serde(default)]
    pub lower_limit: Option<f64>,
    /// Inclusive upper bound (absolute style)
    #[serde(default)]
    pub upper_limit: Option<f64>,
    /// Center of the band (relative style)
    #[serde(default)]
    pub expected_value: Option<f64>,
    /// Allowed deviation from `expected_value` in percent (relative style)
    #[serde(default)]
    pub percent_deviation: Option<f64>,
}

impl ThresholdConfig {
    /// Absolute band in `unit`.
    pub fn absolute(
        unit_type: UnitType,
        unit: &str,
        lower_limit: Option<f64>,
        upper_limit: Option<f64>,
    ) -> Self {
        Self {
            unit_type: Some(unit_type.to_string()),
            unit: Some(unit.to_string()),
            lower_limit,
            upper_limit,
            ..Default::default()
        }
    }

    /// Relative band `expected ± percent%` in `unit`.
    pub fn relative(unit_type: UnitType, unit: &str, expected: f64, percent: f64) -> Self {
        Self {
            unit_type: Some(unit_type.to_string()),
            unit: Some(unit.to_string()),
            expected_value: Some(expected),
            percent_deviation: Some(percent),
            ..Default::default()
        }
    }
}

/// Validated limit style.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limits {
    /// Explicit bounds; absent bounds are infinite.
    Absolute {
        /// Lower bound, `-inf` when not configured
        lower: f64,
        /// Upper bound, `+inf` when not configured
        upper: f64,
    },
    /// Band derived from an expected value and a percent deviation.
    Relative {
        /// Center of the band
        expected: f64,
        /// Half-width of the band in percent of `expected`
        percent_deviation: f64,
    },
}

/// Threshold configuration after boundary validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSpec {
    /// Quantity the limits measure
    pub unit_type: UnitType,
    /// Unit the limits are expressed in, registered for `unit_type`
    pub unit: String,
    /// Limit style and values
    pub limits: Limits,
}

impl ThresholdSpec {
    /// Validate a raw configuration.
    pub fn parse(config: &ThresholdConfig) -> BenchResult<Self> {
        let unit_type_name = config
            .unit_type
            .as_deref()
            .ok_or(BenchError::MissingField("unit_type"))?;
        let unit = config
            .unit
            .as_deref()
            .ok_or(BenchError::MissingField("unit"))?;

        let unit_type: UnitType = unit_type_name.parse()?;
        if !unit_type.accepts(unit) {
            return Err(BenchError::IncompatibleUnit {
                unit_type: unit_type.to_string(),
                unit: unit.to_string(),
            });
        }

        for (field, value) in [
            ("lower_limit", config.lower_limit),
            ("upper_limit", config.upper_limit),
            ("expected_value", config.expected_value),
            ("percent_deviation", config.percent_deviation),
        ] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(BenchError::MalformedThreshold(format!(
                    "{field} must be a finite number, got {value}"
                )));
            }
        }

        let has_absolute = config.lower_limit.is_some() || config.upper_limit.is_some();
        let has_relative = config.expected_value.is_some() || config.percent_deviation.is_some();

        let limits = match (has_absolute, has_relative) {
            (true, true) => {
                return Err(BenchError::MalformedThreshold(
                    "absolute limits cannot be combined with expected_value/percent_deviation"
                        .into(),
                ))
            }
            (false, false) => {
                return Err(BenchError::MalformedThreshold(
                    "no limits configured".into(),
                ))
            }
            (true, false) => {
                let lower = config.lower_limit.unwrap_or(f64::NEG_INFINITY);
                let upper = config.upper_limit.unwrap_or(f64::INFINITY);
                if lower > upper {
                    return Err(BenchError::MalformedThreshold(format!(
                        "lower_limit {lower} exceeds upper_limit {upper}"
                    )));
                }
                Limits::Absolute { lower, upper }
            }
            (false, true) => match (config.expected_value, config.percent_deviation) {
                (Some(expected), Some(percent_deviation)) => {
                    if percent_deviation < 0.0 {
                        return Err(BenchError::MalformedThreshold(format!(
                            "percent_deviation must be non-negative, got {percent_deviation}"
                        )));
                    }
                    Limits::Relative {
                        expected,
                        percent_deviation,
                    }
                }
                (Some(_), None) => {
                    return Err(BenchError::MalformedThreshold(
                        "expected_value requires percent_deviation".into(),
                    ))
                }
                _ => {
                    return Err(BenchError::MalformedThreshold(
                        "percent_deviation requires expected_value".into(),
                    ))
                }
            },
        };

        Ok(Self {
            unit_type,
            unit: unit.to_string(),
            limits,
        })
    }

    /// Resolve into a concrete band.
    pub fn threshold(&self) -> Threshold {
        match self.limits {
            Limits::Absolute { lower, upper } => Threshold {
                lower: self.bound(lower),
                upper: self.bound(upper),
            },
            Limits::Relative {
                expected,
                percent_deviation,
            } => Threshold::from_deviation(expected, percent_deviation, self.unit_type, &self.unit),
        }
    }

    fn bound(&self, value: f64) -> Metric {
        Metric {
            value,
            unit_type: self.unit_type,
            unit: self.unit.clone(),
            name: None,
        }
    }
}

/// A closed pass band `[lower, upper]`; both bounds share one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Inclusive lower bound
    pub lower: Metric,
    /// Inclusive upper bound
    pub upper: Metric,
}

impl Threshold {
    /// Band of `expected * (1 ± percent/100)` in `unit`.
    ///
    /// The unit is trusted here; use [`ThresholdSpec::parse`] for unvalidated input.
    pub fn from_deviation(expected: f64, percent: f64, unit_type: UnitType, unit: &str) -> Self {
        let a = expected * (1.0 - percent / 100.0);
        let b = expected * (1.0 + percent / 100.0);
        // negative expected values flip the band
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        let bound = |value| Metric {
            value,
            unit_type,
            unit: unit.to_string(),
            name: None,
        };
        Self {
            lower: bound(lower),
            upper: bound(upper),
        }
    }

    /// Parse and resolve a raw configuration in one step.
    pub fn from_config(config: &ThresholdConfig) -> BenchResult<Self> {
        Ok(ThresholdSpec::parse(config)?.threshold())
    }

    /// Quantity both bounds measure.
    pub fn unit_type(&self) -> UnitType {
        self.lower.unit_type
    }

    /// Whether `lower <= actual <= upper` after converting `actual` into the band's unit.
    pub fn contains(&self, actual: &Metric) -> BenchResult<bool> {
        if actual.unit_type != self.unit_type() {
            return Err(BenchError::UnitTypeMismatch {
                left: self.unit_type().to_string(),
                right: actual.unit_type.to_string(),
            });
        }
        let value = actual.to_unit(&self.lower.unit)?.value;
        Ok(self.lower.value <= value && value <= self.upper.value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amps(value: f64) -> Metric {
        Metric::new(value, UnitType::Current, "A").unwrap()
    }

    #[test]
    fn absolute_band_checks_inclusive_bounds() {
        let config = ThresholdConfig::absolute(UnitType::Current, "A", Some(1.5), Some(2.5));
        let threshold = Threshold::from_config(&config).unwrap();
        assert!(threshold.contains(&amps(2.214)).unwrap());
        assert!(threshold.contains(&amps(1.5)).unwrap());
        assert!(threshold.contains(&amps(2.5)).unwrap());
        assert!(!threshold.contains(&amps(2.6)).unwrap());

        let narrow = ThresholdConfig::absolute(UnitType::Current, "A", Some(1.5), Some(2.0));
        assert!(!Threshold::from_config(&narrow)
            .unwrap()
            .contains(&amps(2.214))
            .unwrap());
    }

    #[test]
    fn missing_absolute_bound_is_unbounded() {
        let config = ThresholdConfig::absolute(UnitType::Power, "mW", None, Some(100.0));
        let threshold = Threshold::from_config(&config).unwrap();
        assert_eq!(threshold.lower.value, f64::NEG_INFINITY);
        assert!(threshold.contains(&Metric::milliwatts(-1e12)).unwrap());
        assert!(!threshold.contains(&Metric::milliwatts(100.1)).unwrap());
    }

    #[test]
    fn relative_band_derives_bounds() {
        let config = ThresholdConfig::relative(UnitType::Current, "mA", 200.0, 10.0);
        let threshold = Threshold::from_config(&config).unwrap();
        assert!((threshold.lower.value - 180.0).abs() < 1e-9);
        assert!((threshold.upper.value - 220.0).abs() < 1e-9);
        assert_eq!(threshold.lower.unit, "mA");
        assert!(threshold.contains(&amps(0.21)).unwrap());
    }

    #[test]
    fn rejects_mixed_absolute_and_relative() {
        let config = ThresholdConfig {
            lower_limit: Some(1.0),
            expected_value: Some(2.0),
            ..ThresholdConfig::absolute(UnitType::Current, "A", None, None)
        };
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::MalformedThreshold(_))
        ));
    }

    #[test]
    fn rejects_partial_relative_pair() {
        let config = ThresholdConfig {
            percent_deviation: Some(5.0),
            ..ThresholdConfig::absolute(UnitType::Current, "A", None, None)
        };
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::MalformedThreshold(_))
        ));

        let config = ThresholdConfig {
            expected_value: Some(5.0),
            ..ThresholdConfig::absolute(UnitType::Current, "A", None, None)
        };
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::MalformedThreshold(_))
        ));
    }

    #[test]
    fn required_fields_are_checked_first() {
        let config = ThresholdConfig {
            lower_limit: Some(1.0),
            expected_value: Some(2.0),
            ..Default::default()
        };
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::MissingField("unit_type"))
        ));

        let config = ThresholdConfig {
            unit_type: Some("current".into()),
            lower_limit: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::MissingField("unit"))
        ));
    }

    #[test]
    fn rejects_inverted_bounds_and_negative_deviation() {
        let inverted = ThresholdConfig::absolute(UnitType::Current, "A", Some(3.0), Some(1.0));
        assert!(ThresholdSpec::parse(&inverted).is_err());

        let negative = ThresholdConfig::relative(UnitType::Current, "A", 3.0, -1.0);
        assert!(ThresholdSpec::parse(&negative).is_err());
    }

    #[test]
    fn rejects_non_finite_limits() {
        let nan_lower = ThresholdConfig::absolute(UnitType::Current, "A", Some(f64::NAN), Some(1.0));
        assert!(matches!(
            ThresholdSpec::parse(&nan_lower),
            Err(BenchError::MalformedThreshold(_))
        ));
        let nan_upper = ThresholdConfig::absolute(UnitType::Current, "A", None, Some(f64::NAN));
        assert!(ThresholdSpec::parse(&nan_upper).is_err());
        let nan_expected = ThresholdConfig::relative(UnitType::Current, "A", f64::NAN, 5.0);
        assert!(ThresholdSpec::parse(&nan_expected).is_err());
        let infinite = ThresholdConfig::absolute(UnitType::Current, "A", Some(f64::INFINITY), None);
        assert!(ThresholdSpec::parse(&infinite).is_err());

        // implicit bounds are still unbounded
        let open = ThresholdConfig::absolute(UnitType::Current, "A", Some(0.0), None);
        assert!(ThresholdSpec::parse(&open).is_ok());
    }

    #[test]
    fn rejects_unit_outside_type() {
        let config = ThresholdConfig::absolute(UnitType::Current, "mW", Some(1.0), None);
        assert!(matches!(
            ThresholdSpec::parse(&config),
            Err(BenchError::IncompatibleUnit { .. })
        ));
    }

    #[test]
    fn contains_rejects_other_unit_type() {
        let config = ThresholdConfig::absolute(UnitType::Power, "mW", Some(1.0), None);
        let threshold = Threshold::from_config(&config).unwrap();
        assert!(threshold.contains(&amps(1.0)).is_err());
    }

    #[test]
    fn deserializes_from_toml_map() {
        let config: ThresholdConfig = toml::from_str(
            r#"
            unit_type = "current"
            unit = "mA"
            expected_value = 120.0
            percent_deviation = 5.0
            "#,
        )
        .unwrap();
        let spec = ThresholdSpec::parse(&config).unwrap();
        assert_eq!(
            spec.limits,
            Limits::Relative {
                expected: 120.0,
                percent_deviation: 5.0
            }
        );
    }
}
