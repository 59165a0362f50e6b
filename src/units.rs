//! Unit-aware measurement values.
//!
//! A [`Metric`] is an immutable value tagged with a [`UnitType`] and a unit string
//! drawn from that type's conversion table. Arithmetic and comparison between two
//! metrics require matching unit types; the right operand is converted into the
//! left operand's unit before the operation.
//!
//! # Conversion Tables
//!
//! | Unit type | Units (factor relative to base) |
//! |-----------|---------------------------------|
//! | Current   | uA (1e-6), mA (1e-3), A (1)     |
//! | Power     | uW (1e-6), mW (1e-3), W (1)     |
//! | Time      | ms (1e-3), s (1), m (60), h (3600) |
//! | Voltage   | mV (1e-3), V (1)                |
//!
//! Converting `m` into `target` multiplies by `factor(m.unit) / factor(target)`.
//!
//! # Example
//!
//! ```
//! use power_bench::units::{Metric, UnitType};
//!
//! let avg = Metric::new(2.214, UnitType::Current, "A").unwrap();
//! let in_ma = avg.to_unit("mA").unwrap();
//! assert!((in_ma.value - 2214.0).abs() < 1e-9);
//! ```

use crate::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Canonical unit for current metrics produced by aggregation.
pub const MILLIAMPS: &str = "mA";
/// Canonical unit for power metrics produced by aggregation.
pub const MILLIWATTS: &str = "mW";

/// Physical quantity a [`Metric`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    /// Amps and milliamps
    Current,
    /// Watts and milliwatts
    Power,
    /// Milliseconds through hours
    Time,
    /// Volts and millivolts
    Voltage,
}

impl UnitType {
    /// Conversion table: `(unit, factor relative to the base unit)`.
    pub fn units(&self) -> &'static [(&'static str, f64)] {
        match self {
            UnitType::Current => &[("uA", 1e-6), ("mA", 1e-3), ("A", 1.0)],
            UnitType::Power => &[("uW", 1e-6), ("mW", 1e-3), ("W", 1.0)],
            UnitType::Time => &[("ms", 1e-3), ("s", 1.0), ("m", 60.0), ("h", 3600.0)],
            UnitType::Voltage => &[("mV", 1e-3), ("V", 1.0)],
        }
    }

    /// Look up the conversion factor of `unit`, if registered for this type.
    pub fn factor(&self, unit: &str) -> Option<f64> {
        self.units()
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, factor)| *factor)
    }

    /// Whether `unit` belongs to this type's table.
    pub fn accepts(&self, unit: &str) -> bool {
        self.factor(unit).is_some()
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitType::Current => "current",
            UnitType::Power => "power",
            UnitType::Time => "time",
            UnitType::Voltage => "voltage",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for UnitType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "current" => Ok(UnitType::Current),
            "power" => Ok(UnitType::Power),
            "time" => Ok(UnitType::Time),
            "voltage" => Ok(UnitType::Voltage),
            _ => Err(BenchError::UnknownUnitType(s.to_string())),
        }
    }
}

/// A unit-tagged numeric measurement.
///
/// Never mutated in place: conversion and arithmetic return new values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    /// Magnitude expressed in `unit`
    pub value: f64,
    /// Quantity being measured
    pub unit_type: UnitType,
    /// Unit string, registered under `unit_type`
    pub unit: String,
    /// Optional metric name (e.g. "avg_current")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Metric {
    /// Create a metric, rejecting units that do not belong to `unit_type`.
    pub fn new(value: f64, unit_type: UnitType, unit: impl Into<String>) -> BenchResult<Self> {
        let unit = unit.into();
        if !unit_type.accepts(&unit) {
            return Err(BenchError::IncompatibleUnit {
                unit_type: unit_type.to_string(),
                unit,
            });
        }
        Ok(Self {
            value,
            unit_type,
            unit,
            name: None,
        })
    }

    /// Current in milliamps.
    pub fn milliamps(value: f64) -> Self {
        Self::canonical(value, UnitType::Current, MILLIAMPS)
    }

    /// Power in milliwatts.
    pub fn milliwatts(value: f64) -> Self {
        Self::canonical(value, UnitType::Power, MILLIWATTS)
    }

    fn canonical(value: f64, unit_type: UnitType, unit: &'static str) -> Self {
        Self {
            value,
            unit_type,
            unit: unit.to_string(),
            name: None,
        }
    }

    /// Attach a name to the metric.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Convert into `target` unit of the same unit type.
    pub fn to_unit(&self, target: &str) -> BenchResult<Metric> {
        let target_factor = self
            .unit_type
            .factor(target)
            .ok_or_else(|| BenchError::IncompatibleUnit {
                unit_type: self.unit_type.to_string(),
                unit: target.to_string(),
            })?;
        let own_factor = self.own_factor()?;
        Ok(Metric {
            value: self.value * own_factor / target_factor,
            unit_type: self.unit_type,
            unit: target.to_string(),
            name: self.name.clone(),
        })
    }

    /// Value of `other` expressed in this metric's unit.
    fn aligned(&self, other: &Metric) -> BenchResult<f64> {
        if self.unit_type != other.unit_type {
            return Err(BenchError::UnitTypeMismatch {
                left: self.unit_type.to_string(),
                right: other.unit_type.to_string(),
            });
        }
        Ok(other.to_unit(&self.unit)?.value)
    }

    fn own_factor(&self) -> BenchResult<f64> {
        self.unit_type
            .factor(&self.unit)
            .ok_or_else(|| BenchError::IncompatibleUnit {
                unit_type: self.unit_type.to_string(),
                unit: self.unit.clone(),
            })
    }

    /// `self + other`, in `self`'s unit and keeping `self`'s name.
    pub fn try_add(&self, other: &Metric) -> BenchResult<Metric> {
        let rhs = self.aligned(other)?;
        Ok(Metric {
            value: self.value + rhs,
            ..self.clone()
        })
    }

    /// `self - other`, in `self`'s unit and keeping `self`'s name.
    pub fn try_sub(&self, other: &Metric) -> BenchResult<Metric> {
        let rhs = self.aligned(other)?;
        Ok(Metric {
            value: self.value - rhs,
            ..self.clone()
        })
    }

    /// Compare against `other` converted into this metric's unit.
    pub fn try_cmp(&self, other: &Metric) -> BenchResult<Option<Ordering>> {
        let rhs = self.aligned(other)?;
        Ok(self.value.partial_cmp(&rhs))
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        matches!(self.try_cmp(other), Ok(Some(Ordering::Equal)))
    }
}

impl PartialOrd for Metric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok().flatten()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [UnitType; 4] = [
        UnitType::Current,
        UnitType::Power,
        UnitType::Time,
        UnitType::Voltage,
    ];

    #[test]
    fn conversion_round_trips_for_every_registered_pair() {
        for unit_type in ALL_TYPES {
            for (from, _) in unit_type.units() {
                for (to, _) in unit_type.units() {
                    let original = Metric::new(123.456, unit_type, *from).unwrap();
                    let back = original.to_unit(to).unwrap().to_unit(from).unwrap();
                    let tolerance = 1e-9 * original.value.abs().max(1.0);
                    assert!(
                        (back.value - original.value).abs() < tolerance,
                        "{unit_type}: {from} -> {to} -> {from} gave {}",
                        back.value
                    );
                }
            }
        }
    }

    #[test]
    fn converts_hours_to_milliseconds() {
        let hours = Metric::new(1.5, UnitType::Time, "h").unwrap();
        assert!((hours.to_unit("ms").unwrap().value - 5_400_000.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_unit_from_another_table() {
        let err = Metric::new(1.0, UnitType::Current, "mW").unwrap_err();
        assert!(matches!(err, BenchError::IncompatibleUnit { .. }));

        let amps = Metric::milliamps(10.0);
        assert!(matches!(
            amps.to_unit("V"),
            Err(BenchError::IncompatibleUnit { .. })
        ));
    }

    #[test]
    fn add_converts_right_operand_into_left_unit() {
        let a = Metric::milliamps(500.0).named("avg_current");
        let b = Metric::new(0.25, UnitType::Current, "A").unwrap();
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum.unit, "mA");
        assert_eq!(sum.name.as_deref(), Some("avg_current"));
        assert!((sum.value - 750.0).abs() < 1e-9);

        let diff = a.try_sub(&b).unwrap();
        assert!((diff.value - 250.0).abs() < 1e-9);
    }

    #[test]
    fn arithmetic_across_unit_types_fails() {
        let current = Metric::milliamps(1.0);
        let power = Metric::milliwatts(1.0);
        assert!(matches!(
            current.try_add(&power),
            Err(BenchError::UnitTypeMismatch { .. })
        ));
        assert!(current.partial_cmp(&power).is_none());
        assert!(current != power);
    }

    #[test]
    fn ordering_uses_converted_values() {
        let small = Metric::milliamps(900.0);
        let large = Metric::new(1.0, UnitType::Current, "A").unwrap();
        assert!(small < large);
        assert_eq!(Metric::milliamps(1000.0), large);
    }

    #[test]
    fn unit_type_parses_case_insensitively() {
        assert_eq!("Current".parse::<UnitType>().unwrap(), UnitType::Current);
        assert_eq!(" POWER ".parse::<UnitType>().unwrap(), UnitType::Power);
        assert!(matches!(
            "energy".parse::<UnitType>(),
            Err(BenchError::UnknownUnitType(_))
        ));
    }

    #[test]
    fn display_uses_three_decimals() {
        assert_eq!(Metric::milliamps(2214.0).to_string(), "2214.000 mA");
    }
}
