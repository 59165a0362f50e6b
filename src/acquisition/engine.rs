//! Acquisition engine: drives the monitor through one acquisition cycle.
//!
//! The engine advances [`AcquisitionState`] one transition at a time. Each
//! transition races the cancellation signal, so a cancel request interrupts a
//! running measurement or a backoff sleep immediately. Whatever the outcome, the
//! monitor is disconnected before [`AcquisitionEngine::acquire`] returns.

use crate::acquisition::cancel::CancelSignal;
use crate::acquisition::state::AcquisitionState;
use crate::acquisition::{
    Acquisition, AcquisitionAttempt, AcquisitionConfig, AcquisitionReport, AttemptOutcome,
    MonitorSettings,
};
use crate::error::{BenchError, BenchResult, HardwareError};
use crate::hardware::{CurrentMonitor, DeviceUnderTest, MeasurementFailure, MeasurementRequest};
use crate::window::RawSample;
use tracing::{debug, error, info, warn};

/// Per-cycle bookkeeping.
struct Cycle {
    request: MeasurementRequest,
    min_required: f64,
    history: Vec<AcquisitionAttempt>,
    recovery_cycles: u32,
    backoff_sleeps: u32,
    last_error: Option<String>,
    /// Set once a reset in this cycle succeeded
    counters_reset: bool,
}

impl Cycle {
    fn record(
        &mut self,
        attempt_index: u32,
        sample_count: usize,
        recovered: bool,
        outcome: AttemptOutcome,
        error: Option<&HardwareError>,
    ) {
        let error = error.map(ToString::to_string);
        match outcome {
            AttemptOutcome::Accepted => info!(
                attempt = attempt_index,
                %outcome,
                samples = sample_count,
                min_required = self.min_required,
                recovered,
                "acquisition attempt"
            ),
            _ => warn!(
                attempt = attempt_index,
                %outcome,
                samples = sample_count,
                min_required = self.min_required,
                recovered,
                error = error.as_deref().unwrap_or("-"),
                "acquisition attempt"
            ),
        }
        if error.is_some() {
            self.last_error = error.clone();
        }
        self.history.push(AcquisitionAttempt {
            attempt_index,
            sample_count,
            recovered,
            outcome,
            error,
        });
    }

    fn exhausted(&self, attempts: u32) -> BenchError {
        BenchError::AcquisitionExhausted {
            attempts,
            history: self.history.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn enough(&self, samples: &[RawSample]) -> bool {
        !samples.is_empty() && samples.len() as f64 >= self.min_required
    }

    fn into_report(self) -> AcquisitionReport {
        AcquisitionReport {
            attempts: self.history,
            recovery_cycles: self.recovery_cycles,
            backoff_sleeps: self.backoff_sleeps,
        }
    }
}

/// Bounded-retry acquisition over a current monitor and a device under test.
///
/// The engine owns both collaborators; no one else can drive the monitor while a
/// cycle runs.
pub struct AcquisitionEngine<M, D> {
    monitor: M,
    device: D,
    config: AcquisitionConfig,
    settings: MonitorSettings,
}

impl<M, D> AcquisitionEngine<M, D>
where
    M: CurrentMonitor,
    D: DeviceUnderTest,
{
    /// Engine owning `monitor` and `device`.
    pub fn new(monitor: M, device: D, config: AcquisitionConfig, settings: MonitorSettings) -> Self {
        Self {
            monitor,
            device,
            config,
            settings,
        }
    }

    /// Retry limits in use.
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Output settings applied on every connect.
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// The driven monitor.
    pub fn monitor(&self) -> &M {
        &self.monitor
    }

    /// The device under test.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Give the collaborators back.
    pub fn into_parts(self) -> (M, D) {
        (self.monitor, self.device)
    }

    /// Run one acquisition cycle.
    pub async fn acquire(&mut self, request: &MeasurementRequest) -> BenchResult<Acquisition> {
        self.acquire_with_cancel(request, CancelSignal::never())
            .await
    }

    /// Run one acquisition cycle, aborting with [`BenchError::Canceled`] when
    /// `cancel` fires. Partial samples are discarded on cancellation.
    pub async fn acquire_with_cancel(
        &mut self,
        request: &MeasurementRequest,
        mut cancel: CancelSignal,
    ) -> BenchResult<Acquisition> {
        if !(request.frequency_hz > 0.0 && request.duration_sec >= 0.0 && request.offset_sec >= 0.0)
        {
            return Err(BenchError::Configuration(format!(
                "invalid measurement request: {} Hz for {} s (+{} s offset)",
                request.frequency_hz, request.duration_sec, request.offset_sec
            )));
        }

        let mut cycle = Cycle {
            request: *request,
            min_required: request.min_required(self.config.min_sample_percent),
            history: Vec::new(),
            recovery_cycles: 0,
            backoff_sleeps: 0,
            last_error: None,
            counters_reset: false,
        };
        info!(
            frequency_hz = request.frequency_hz,
            duration_sec = request.duration_sec,
            offset_sec = request.offset_sec,
            expected = request.expected_samples(),
            min_required = cycle.min_required,
            "starting acquisition"
        );

        let mut state = AcquisitionState::Idle;
        let result = loop {
            state = match state {
                AcquisitionState::Succeeded { samples } => break Ok(samples),
                AcquisitionState::Fatal(err) => break Err(err),
                current => {
                    debug!(state = %current, "acquisition transition");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            info!("acquisition canceled, discarding partial samples");
                            AcquisitionState::Fatal(BenchError::Canceled)
                        }
                        next = self.step(current, &mut cycle) => next,
                    }
                }
            };
        };

        self.release().await;

        match result {
            Ok(samples) => {
                info!(
                    samples = samples.len(),
                    attempts = cycle.history.len(),
                    recovery_cycles = cycle.recovery_cycles,
                    "acquisition succeeded"
                );
                Ok(Acquisition {
                    samples,
                    report: cycle.into_report(),
                })
            }
            Err(err) => {
                error!(error = %err, "acquisition failed");
                Err(err)
            }
        }
    }

    async fn step(&mut self, state: AcquisitionState, cycle: &mut Cycle) -> AcquisitionState {
        match state {
            AcquisitionState::Idle => match self.prepare().await {
                Ok(()) => AcquisitionState::Measuring {
                    attempt: 1,
                    recovered: false,
                },
                Err(error) => {
                    cycle.record(1, 0, false, AttemptOutcome::HardwareError, Some(&error));
                    AcquisitionState::Errored {
                        attempt: 1,
                        error,
                        partial: Vec::new(),
                    }
                }
            },

            AcquisitionState::Measuring { attempt, recovered } => {
                self.measure(attempt, recovered, cycle).await
            }

            AcquisitionState::Errored { attempt, partial, .. } => {
                if attempt >= self.config.measurement_retry_limit {
                    AcquisitionState::Fatal(cycle.exhausted(attempt))
                } else {
                    AcquisitionState::Recovering {
                        attempt,
                        recovery_try: 1,
                        partial,
                    }
                }
            }

            AcquisitionState::Recovering {
                attempt,
                recovery_try,
                partial,
            } => match self.recover().await {
                Ok(()) => AcquisitionState::RecoverySucceeded { attempt, partial },
                Err(error) => {
                    let backoff = self.config.recovery_backoff;
                    warn!(
                        attempt,
                        recovery_try,
                        backoff = ?backoff,
                        error = %error,
                        "monitor recovery failed"
                    );
                    tokio::time::sleep(backoff).await;
                    cycle.backoff_sleeps += 1;
                    if recovery_try >= self.config.recovery_retry_limit {
                        AcquisitionState::RecoveryFailed {
                            attempts: recovery_try,
                            error,
                        }
                    } else {
                        AcquisitionState::Recovering {
                            attempt,
                            recovery_try: recovery_try + 1,
                            partial,
                        }
                    }
                }
            },

            AcquisitionState::RecoverySucceeded { attempt, partial } => {
                cycle.recovery_cycles += 1;
                info!(attempt, partial = partial.len(), "monitor link recovered");
                if cycle.enough(&partial) {
                    info!(
                        samples = partial.len(),
                        "keeping samples captured before the link failure"
                    );
                    AcquisitionState::Succeeded { samples: partial }
                } else {
                    // without a successful reset the retry has to start from scratch
                    AcquisitionState::Measuring {
                        attempt: attempt + 1,
                        recovered: cycle.counters_reset,
                    }
                }
            }

            AcquisitionState::RecoveryFailed { attempts, error } => {
                AcquisitionState::Fatal(BenchError::RecoveryExhausted {
                    attempts,
                    history: cycle.history.clone(),
                    last_error: error.to_string(),
                })
            }

            terminal @ (AcquisitionState::Succeeded { .. } | AcquisitionState::Fatal(_)) => terminal,
        }
    }

    async fn measure(&mut self, attempt: u32, recovered: bool, cycle: &mut Cycle) -> AcquisitionState {
        if !recovered {
            if let Err(error) = self.device.reset_counters().await {
                cycle.record(attempt, 0, recovered, AttemptOutcome::HardwareError, Some(&error));
                return AcquisitionState::Errored {
                    attempt,
                    error,
                    partial: Vec::new(),
                };
            }
            cycle.counters_reset = true;
        }

        match self.monitor.start_measurement(&cycle.request).await {
            Ok(handle) => {
                debug!(
                    attempt,
                    average_current = handle.average_current(),
                    "measurement complete"
                );
                let samples = handle.into_samples();
                if cycle.enough(&samples) {
                    cycle.record(attempt, samples.len(), recovered, AttemptOutcome::Accepted, None);
                    AcquisitionState::Succeeded { samples }
                } else {
                    cycle.record(
                        attempt,
                        samples.len(),
                        recovered,
                        AttemptOutcome::Insufficient,
                        None,
                    );
                    if attempt >= self.config.measurement_retry_limit {
                        AcquisitionState::Fatal(cycle.exhausted(attempt))
                    } else {
                        AcquisitionState::Measuring {
                            attempt: attempt + 1,
                            recovered: false,
                        }
                    }
                }
            }
            Err(MeasurementFailure { error, partial }) => {
                cycle.record(
                    attempt,
                    partial.len(),
                    recovered,
                    AttemptOutcome::HardwareError,
                    Some(&error),
                );
                AcquisitionState::Errored {
                    attempt,
                    error,
                    partial,
                }
            }
        }
    }

    /// Connect and apply output settings.
    async fn prepare(&mut self) -> Result<(), HardwareError> {
        self.monitor.connect().await?;
        self.monitor.set_voltage(self.settings.voltage).await?;
        self.monitor.set_max_current(self.settings.max_current).await?;
        debug!(
            voltage = self.settings.voltage,
            max_current = self.settings.max_current,
            "monitor prepared"
        );
        Ok(())
    }

    /// Reconnect the monitor and re-enable the device's data channel.
    async fn recover(&mut self) -> Result<(), HardwareError> {
        if let Err(err) = self.monitor.disconnect().await {
            debug!(error = %err, "disconnect before reconnect failed");
        }
        self.prepare().await?;
        self.device.reconnect().await
    }

    async fn release(&mut self) {
        if let Err(err) = self.monitor.disconnect().await {
            warn!(error = %err, "failed to disconnect monitor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{FaultPlan, MeasurementScript, MockDevice, MockMonitor};
    use std::time::Duration;
    use tracing_test::traced_test;

    fn engine(monitor: MockMonitor, device: MockDevice) -> AcquisitionEngine<MockMonitor, MockDevice> {
        AcquisitionEngine::new(
            monitor,
            device,
            AcquisitionConfig::default(),
            MonitorSettings::default(),
        )
    }

    fn request() -> MeasurementRequest {
        MeasurementRequest::new(100.0, 1.0, 0.0)
    }

    #[tokio::test]
    async fn clean_run_applies_settings_and_disconnects() {
        let monitor = MockMonitor::new(0.25);
        let observed = monitor.clone();
        let device = MockDevice::new();
        let mut engine = engine(monitor, device.clone());

        let acquisition = engine.acquire(&request()).await.unwrap();
        assert_eq!(acquisition.samples.len(), 100);
        assert_eq!(acquisition.report.attempts.len(), 1);
        assert_eq!(acquisition.report.attempts[0].outcome, AttemptOutcome::Accepted);
        assert_eq!(observed.voltage(), Some(4.2));
        assert_eq!(observed.max_current(), Some(8.0));
        assert!(!observed.is_connected());
        assert_eq!(device.resets(), 1);
    }

    #[tokio::test]
    async fn short_run_is_remeasured_with_counter_reset() {
        let monitor = MockMonitor::new(0.25)
            .with_plan(FaultPlan::none().then(MeasurementScript::Short { fraction: 0.5 }));
        let device = MockDevice::new();
        let mut engine = engine(monitor, device.clone());

        let acquisition = engine.acquire(&request()).await.unwrap();
        let outcomes: Vec<_> = acquisition.report.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![AttemptOutcome::Insufficient, AttemptOutcome::Accepted]
        );
        assert_eq!(device.resets(), 2);
        assert_eq!(acquisition.report.recovery_cycles, 0);
    }

    #[tokio::test]
    async fn sufficient_partial_data_is_kept_after_recovery() {
        let monitor = MockMonitor::new(0.25)
            .with_plan(FaultPlan::none().then(MeasurementScript::Drop { fraction: 0.97 }));
        let observed = monitor.clone();
        let mut engine = engine(monitor, MockDevice::new());

        let acquisition = engine.acquire(&request()).await.unwrap();
        assert_eq!(acquisition.samples.len(), 97);
        assert_eq!(acquisition.report.recovery_cycles, 1);
        assert_eq!(observed.stats().measurements, 1);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_connecting() {
        let monitor = MockMonitor::new(0.25);
        let observed = monitor.clone();
        let mut engine = engine(monitor, MockDevice::new());
        let err = engine
            .acquire(&MeasurementRequest::new(0.0, 1.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Configuration(_)));
        assert_eq!(observed.stats().connects, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_reconnect_failure_backs_off() {
        let monitor = MockMonitor::new(0.25).with_plan(FaultPlan::fail_first(1));
        let device = MockDevice::new().with_reconnect_failures(1);
        let mut engine = engine(monitor, device.clone());

        let acquisition = engine.acquire(&request()).await.unwrap();
        assert_eq!(acquisition.report.backoff_sleeps, 1);
        assert_eq!(acquisition.report.recovery_cycles, 1);
        assert_eq!(device.reconnects(), 1);
        let last = acquisition.report.attempts.last().unwrap();
        assert!(last.recovered);
        assert_eq!(last.attempt_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_running_measurement() {
        let monitor = MockMonitor::new(0.25).with_latency(Duration::from_secs(60));
        let observed = monitor.clone();
        let mut engine = engine(monitor, MockDevice::new());

        let err = engine
            .acquire_with_cancel(&request(), CancelSignal::deadline(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, BenchError::Canceled));
        assert!(!observed.is_connected());
        assert!(!observed.is_armed());
    }

    #[tokio::test]
    #[traced_test]
    async fn attempts_are_logged() {
        let monitor = MockMonitor::new(0.25).with_plan(FaultPlan::fail_first(1));
        let mut engine = engine(monitor, MockDevice::new());
        engine.acquire(&request()).await.unwrap();

        assert!(logs_contain("acquisition attempt"));
        assert!(logs_contain("outcome=hardware_error"));
        assert!(logs_contain("recovered=true"));
        assert!(logs_contain("monitor link recovered"));
    }
}
