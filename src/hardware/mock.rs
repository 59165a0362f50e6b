//! Mock Hardware Implementations
//!
//! Simulated current monitor and device under test for exercising the acquisition
//! engine without a bench. All delays use `tokio::time::sleep`, so tests running on
//! a paused clock finish instantly.
//!
//! # Fault Injection
//!
//! A [`FaultPlan`] scripts what the monitor does on each call:
//!
//! - per-measurement outcomes ([`MeasurementScript`]), consumed in order, with a
//!   fallback once the script runs out
//! - a number of failing `connect` calls (or a permanently dead link)
//!
//! Both mocks are cheap handles over shared state. Clone one before handing it to
//! the engine and the clone can inspect call counters afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! let monitor = MockMonitor::new(0.2).with_plan(FaultPlan::fail_first(2));
//! let observed = monitor.clone();
//! let mut engine = AcquisitionEngine::new(monitor, MockDevice::new(), config, settings);
//! engine.acquire(&request).await?;
//! assert_eq!(observed.stats().measurements, 3);
//! ```

use crate::error::HardwareError;
use crate::hardware::capabilities::{
    CurrentMonitor, DeviceUnderTest, MeasurementFailure, MeasurementHandle, MeasurementRequest,
};
use crate::window::RawSample;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const MONITOR: &str = "mock_monitor";
const DEVICE: &str = "mock_dut";

// =============================================================================
// Fault Plan
// =============================================================================

/// Outcome of one scripted measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementScript {
    /// Deliver every expected sample.
    Complete,
    /// Finish cleanly but deliver only `fraction` of the expected samples.
    Short { fraction: f64 },
    /// Drop the control link after `fraction` of the expected samples.
    Drop { fraction: f64 },
}

/// Scripted failures for a [`MockMonitor`].
#[derive(Debug, Clone)]
pub struct FaultPlan {
    measurements: VecDeque<MeasurementScript>,
    fallback: MeasurementScript,
    /// `u32::MAX` means the link never comes up
    connect_failures: u32,
}

impl FaultPlan {
    /// Every call succeeds.
    pub fn none() -> Self {
        Self {
            measurements: VecDeque::new(),
            fallback: MeasurementScript::Complete,
            connect_failures: 0,
        }
    }

    /// The first `count` measurements drop the link before any sample arrives.
    pub fn fail_first(count: u32) -> Self {
        let mut plan = Self::none();
        for _ in 0..count {
            plan = plan.then(MeasurementScript::Drop { fraction: 0.0 });
        }
        plan
    }

    /// The monitor is unreachable: connects and measurements always fail.
    pub fn link_down() -> Self {
        Self {
            measurements: VecDeque::new(),
            fallback: MeasurementScript::Drop { fraction: 0.0 },
            connect_failures: u32::MAX,
        }
    }

    /// Append a scripted measurement outcome.
    pub fn then(mut self, script: MeasurementScript) -> Self {
        self.measurements.push_back(script);
        self
    }

    /// Outcome used once the script is exhausted.
    pub fn with_fallback(mut self, script: MeasurementScript) -> Self {
        self.fallback = script;
        self
    }

    /// Fail the next `count` connect calls.
    pub fn with_connect_failures(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    fn next_measurement(&mut self) -> MeasurementScript {
        self.measurements.pop_front().unwrap_or(self.fallback)
    }

    fn take_connect_failure(&mut self) -> bool {
        match self.connect_failures {
            0 => false,
            u32::MAX => true,
            _ => {
                self.connect_failures -= 1;
                true
            }
        }
    }
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self::none()
    }
}

// =============================================================================
// MockMonitor - Simulated Current Monitor
// =============================================================================

/// Call counters of a [`MockMonitor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Successful connects
    pub connects: u32,
    /// Refused connects
    pub failed_connects: u32,
    /// Disconnects, including the final release
    pub disconnects: u32,
    /// Measurements started, including dropped ones
    pub measurements: u32,
}

struct MonitorState {
    connected: bool,
    armed: bool,
    voltage: Option<f64>,
    max_current: Option<f64>,
    base_current: f64,
    noise_amps: f64,
    latency: Duration,
    plan: FaultPlan,
    rng: StdRng,
    stats: MonitorStats,
}

impl MonitorState {
    fn generate(&mut self, count: usize, frequency_hz: f64) -> Vec<RawSample> {
        let period = if frequency_hz > 0.0 {
            1.0 / frequency_hz
        } else {
            0.0
        };
        (0..count)
            .map(|i| {
                let noise = if self.noise_amps > 0.0 {
                    self.rng.gen_range(-self.noise_amps..self.noise_amps)
                } else {
                    0.0
                };
                RawSample::new(i as f64 * period, self.base_current + noise)
            })
            .collect()
    }
}

/// Simulated current monitor with scripted link failures.
///
/// Produces samples at the requested frequency around a constant base current,
/// with optional uniform noise from a seedable RNG.
#[derive(Clone)]
pub struct MockMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl MockMonitor {
    /// Monitor reading `base_current` amps with no noise and no faults.
    pub fn new(base_current: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MonitorState {
                connected: false,
                armed: false,
                voltage: None,
                max_current: None,
                base_current,
                noise_amps: 0.0,
                latency: Duration::ZERO,
                plan: FaultPlan::none(),
                rng: StdRng::from_entropy(),
                stats: MonitorStats::default(),
            })),
        }
    }

    /// Replace the fault script.
    pub fn with_plan(self, plan: FaultPlan) -> Self {
        self.lock().plan = plan;
        self
    }

    /// Uniform noise of ±`amps` on every sample.
    pub fn with_noise(self, amps: f64) -> Self {
        self.lock().noise_amps = amps.abs();
        self
    }

    /// Make the noise reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        self.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Wall time each measurement takes.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Snapshot of the call counters.
    pub fn stats(&self) -> MonitorStats {
        self.lock().stats
    }

    /// Whether the control link is up.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Whether a measurement is in progress.
    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    /// Last voltage applied, if any.
    pub fn voltage(&self) -> Option<f64> {
        self.lock().voltage
    }

    /// Last current limit applied, if any.
    pub fn max_current(&self) -> Option<f64> {
        self.lock().max_current
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require_connected(state: &MonitorState) -> Result<(), HardwareError> {
        if state.connected {
            Ok(())
        } else {
            Err(HardwareError::communication(MONITOR, "not connected"))
        }
    }
}

#[async_trait]
impl CurrentMonitor for MockMonitor {
    async fn connect(&mut self) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if state.plan.take_connect_failure() {
            state.stats.failed_connects += 1;
            return Err(HardwareError::communication(
                MONITOR,
                "device not found on bus",
            ));
        }
        state.connected = true;
        state.stats.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), HardwareError> {
        let mut state = self.lock();
        state.connected = false;
        state.armed = false;
        state.stats.disconnects += 1;
        Ok(())
    }

    async fn set_voltage(&mut self, volts: f64) -> Result<(), HardwareError> {
        let mut state = self.lock();
        Self::require_connected(&state)?;
        state.voltage = Some(volts);
        Ok(())
    }

    async fn set_max_current(&mut self, amps: f64) -> Result<(), HardwareError> {
        let mut state = self.lock();
        Self::require_connected(&state)?;
        state.max_current = Some(amps);
        Ok(())
    }

    async fn start_measurement(
        &mut self,
        request: &MeasurementRequest,
    ) -> Result<MeasurementHandle, MeasurementFailure> {
        let (script, latency, samples) = {
            let mut state = self.lock();
            Self::require_connected(&state)?;
            state.stats.measurements += 1;
            state.armed = true;
            let script = state.plan.next_measurement();
            let expected = request.expected_samples().max(0.0).round() as usize;
            let count = match script {
                MeasurementScript::Complete => expected,
                MeasurementScript::Short { fraction } | MeasurementScript::Drop { fraction } => {
                    (expected as f64 * fraction.clamp(0.0, 1.0)).floor() as usize
                }
            };
            let samples = state.generate(count, request.frequency_hz);
            (script, state.latency, samples)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.lock();
        state.armed = false;
        match script {
            MeasurementScript::Drop { .. } => {
                state.connected = false;
                Err(MeasurementFailure {
                    error: HardwareError::communication(
                        MONITOR,
                        "control link dropped mid-measurement",
                    ),
                    partial: samples,
                })
            }
            _ => Ok(MeasurementHandle::new(samples)),
        }
    }
}

// =============================================================================
// MockDevice - Simulated Device Under Test
// =============================================================================

#[derive(Default)]
struct DeviceState {
    resets: u32,
    reconnects: u32,
    reconnect_failures: u32,
    reset_failures: u32,
}

/// Simulated device under test that counts resets and reconnects.
#[derive(Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Device whose calls all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` reconnect calls.
    pub fn with_reconnect_failures(self, count: u32) -> Self {
        self.lock().reconnect_failures = count;
        self
    }

    /// Fail the next `count` counter resets.
    pub fn with_reset_failures(self, count: u32) -> Self {
        self.lock().reset_failures = count;
        self
    }

    /// Successful counter resets so far.
    pub fn resets(&self) -> u32 {
        self.lock().resets
    }

    /// Successful device reconnects so far.
    pub fn reconnects(&self) -> u32 {
        self.lock().reconnects
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeviceUnderTest for MockDevice {
    async fn reset_counters(&mut self) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if state.reset_failures > 0 {
            state.reset_failures -= 1;
            return Err(HardwareError::communication(DEVICE, "counter reset not acknowledged"));
        }
        state.resets += 1;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if state.reconnect_failures > 0 {
            state.reconnect_failures -= 1;
            return Err(HardwareError::communication(DEVICE, "usb data channel unavailable"));
        }
        state.reconnects += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MeasurementRequest {
        MeasurementRequest::new(10.0, 2.0, 0.0)
    }

    #[tokio::test]
    async fn complete_measurement_yields_expected_samples() {
        let mut monitor = MockMonitor::new(0.5);
        monitor.connect().await.unwrap();
        let handle = monitor.start_measurement(&request()).await.unwrap();
        assert_eq!(handle.len(), 20);
        assert!((handle.samples()[3].timestamp_sec - 0.3).abs() < 1e-12);
        assert_eq!(handle.average_current(), 0.5);
        assert!(!monitor.is_armed());
    }

    #[tokio::test]
    async fn measurement_requires_connection() {
        let mut monitor = MockMonitor::new(0.5);
        let failure = monitor.start_measurement(&request()).await.unwrap_err();
        assert!(failure.partial.is_empty());
        assert_eq!(monitor.stats().measurements, 0);
    }

    #[tokio::test]
    async fn scripted_drop_returns_partial_and_disconnects() {
        let mut monitor = MockMonitor::new(0.5).with_plan(
            FaultPlan::none()
                .then(MeasurementScript::Drop { fraction: 0.5 })
                .then(MeasurementScript::Short { fraction: 0.25 }),
        );
        monitor.connect().await.unwrap();

        let failure = monitor.start_measurement(&request()).await.unwrap_err();
        assert_eq!(failure.partial.len(), 10);
        assert!(!monitor.is_connected());

        monitor.connect().await.unwrap();
        let short = monitor.start_measurement(&request()).await.unwrap();
        assert_eq!(short.len(), 5);

        let full = monitor.start_measurement(&request()).await.unwrap();
        assert_eq!(full.len(), 20);
    }

    #[tokio::test]
    async fn connect_failures_are_consumed() {
        let mut monitor = MockMonitor::new(0.1).with_plan(FaultPlan::none().with_connect_failures(2));
        assert!(monitor.connect().await.is_err());
        assert!(monitor.connect().await.is_err());
        assert!(monitor.connect().await.is_ok());
        assert_eq!(monitor.stats().failed_connects, 2);
        assert_eq!(monitor.stats().connects, 1);
    }

    #[tokio::test]
    async fn dead_link_never_connects() {
        let mut monitor = MockMonitor::new(0.1).with_plan(FaultPlan::link_down());
        for _ in 0..10 {
            assert!(monitor.connect().await.is_err());
        }
        assert!(monitor.set_voltage(4.2).await.is_err());
    }

    #[tokio::test]
    async fn seeded_noise_is_reproducible() {
        let mut a = MockMonitor::new(0.2).with_noise(0.05).with_seed(7);
        let mut b = MockMonitor::new(0.2).with_noise(0.05).with_seed(7);
        a.connect().await.unwrap();
        b.connect().await.unwrap();
        let sa = a.start_measurement(&request()).await.unwrap();
        let sb = b.start_measurement(&request()).await.unwrap();
        assert_eq!(sa.samples(), sb.samples());
        assert!(sa
            .samples()
            .iter()
            .all(|s| (s.current_amps - 0.2).abs() <= 0.05));
    }

    #[tokio::test]
    async fn device_counts_resets_and_reconnect_failures() {
        let mut device = MockDevice::new().with_reconnect_failures(1);
        device.reset_counters().await.unwrap();
        assert!(device.reconnect().await.is_err());
        assert!(device.reconnect().await.is_ok());
        assert_eq!(device.resets(), 1);
        assert_eq!(device.reconnects(), 1);
    }

    #[tokio::test]
    async fn device_reset_failures_are_not_counted() {
        let mut device = MockDevice::new().with_reset_failures(1);
        assert!(device.reset_counters().await.is_err());
        assert!(device.reset_counters().await.is_ok());
        assert_eq!(device.resets(), 1);
    }
}
