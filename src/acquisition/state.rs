//! States of one acquisition cycle.

use crate::error::{BenchError, HardwareError};
use crate::window::RawSample;
use std::fmt;

/// Acquisition cycle state.
///
/// Each state carries exactly the data the next transition needs. Transitions are
/// performed by the engine one state at a time, so cancellation can interrupt the
/// cycle between (and inside) any two transitions.
///
/// # State Machine
///
/// ```text
/// Idle ──prepare──> Measuring ──enough samples──> Succeeded
///   │                 │  ▲  │
///   │                 │  │  └──too few samples──> Measuring (counters reset)
///   │        link fail│  │
///   │                 ▼  │recovered, data still needed
///   └──link fail──> Errored ──last attempt──> Fatal(AcquisitionExhausted)
///                     │
///                     ▼
///                 Recovering ──ok──> RecoverySucceeded ──partial enough──> Succeeded
///                   │  ▲
///                   │  │retry after backoff
///                   ▼──┘
///                 RecoveryFailed ──> Fatal(RecoveryExhausted)
/// ```
#[derive(Debug)]
pub enum AcquisitionState {
    /// Nothing connected yet
    Idle,
    /// Measurement attempt `attempt` in progress
    Measuring { attempt: u32, recovered: bool },
    /// Cycle finished with an accepted sample set
    Succeeded { samples: Vec<RawSample> },
    /// Attempt `attempt` hit a hardware failure
    Errored {
        attempt: u32,
        error: HardwareError,
        partial: Vec<RawSample>,
    },
    /// Reconnect try `recovery_try` after attempt `attempt` failed
    Recovering {
        attempt: u32,
        recovery_try: u32,
        partial: Vec<RawSample>,
    },
    /// Link re-established after attempt `attempt`
    RecoverySucceeded { attempt: u32, partial: Vec<RawSample> },
    /// Every reconnect try failed
    RecoveryFailed { attempts: u32, error: HardwareError },
    /// Cycle aborted
    Fatal(BenchError),
}

impl AcquisitionState {
    /// Whether the cycle has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Succeeded { .. } | AcquisitionState::Fatal(_)
        )
    }

    /// State name without payload, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            AcquisitionState::Idle => "Idle",
            AcquisitionState::Measuring { .. } => "Measuring",
            AcquisitionState::Succeeded { .. } => "Succeeded",
            AcquisitionState::Errored { .. } => "Errored",
            AcquisitionState::Recovering { .. } => "Recovering",
            AcquisitionState::RecoverySucceeded { .. } => "RecoverySucceeded",
            AcquisitionState::RecoveryFailed { .. } => "RecoveryFailed",
            AcquisitionState::Fatal(_) => "Fatal",
        }
    }
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::Measuring { attempt, recovered } => {
                write!(f, "Measuring(attempt {attempt}")?;
                if *recovered {
                    f.write_str(", reconnect")?;
                }
                f.write_str(")")
            }
            AcquisitionState::Succeeded { samples } => {
                write!(f, "Succeeded({} samples)", samples.len())
            }
            AcquisitionState::Errored { attempt, error, .. } => {
                write!(f, "Errored(attempt {attempt}: {error})")
            }
            AcquisitionState::Recovering {
                attempt,
                recovery_try,
                ..
            } => write!(f, "Recovering(attempt {attempt}, try {recovery_try})"),
            AcquisitionState::RecoveryFailed { attempts, .. } => {
                write!(f, "RecoveryFailed({attempts} tries)")
            }
            AcquisitionState::Fatal(err) => write!(f, "Fatal({err})"),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!AcquisitionState::Idle.is_terminal());
        assert!(AcquisitionState::Succeeded { samples: vec![] }.is_terminal());
        assert!(AcquisitionState::Fatal(BenchError::Canceled).is_terminal());
        assert!(!AcquisitionState::Measuring {
            attempt: 1,
            recovered: false
        }
        .is_terminal());
    }

    #[test]
    fn display() {
        let state = AcquisitionState::Measuring {
            attempt: 2,
            recovered: true,
        };
        assert_eq!(state.to_string(), "Measuring(attempt 2, reconnect)");
        assert_eq!(AcquisitionState::Idle.to_string(), "Idle");
        assert_eq!(
            AcquisitionState::Fatal(BenchError::Canceled).to_string(),
            "Fatal(Acquisition canceled)"
        );
        let state = AcquisitionState::RecoverySucceeded {
            attempt: 1,
            partial: vec![],
        };
        assert_eq!(state.to_string(), "RecoverySucceeded");
    }
}
