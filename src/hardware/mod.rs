//! Hardware collaborators
//!
//! Capability traits for the current monitor and the device under test, plus mock
//! implementations with scripted link failures.

pub mod capabilities;
pub mod mock;

pub use capabilities::{
    CurrentMonitor, DeviceUnderTest, MeasurementFailure, MeasurementHandle, MeasurementRequest,
};
pub use mock::{FaultPlan, MeasurementScript, MockDevice, MockMonitor, MonitorStats};
