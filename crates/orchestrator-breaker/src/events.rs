use std::time::{Duration, Instant};

use orchestrator_core::ResilienceEvent;

use crate::circuit::CircuitState;

/// Events emitted by a [`crate::Breaker`] as calls are permitted, rejected,
/// and recorded.
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    StateTransition { name: String, from: CircuitState, to: CircuitState, timestamp: Instant },
    CallPermitted { name: String, state: CircuitState, timestamp: Instant },
    CallRejected { name: String, timestamp: Instant },
    SuccessRecorded { name: String, duration: Duration, timestamp: Instant },
    FailureRecorded { name: String, duration: Duration, timestamp: Instant },
    SlowCallDetected { name: String, duration: Duration, timestamp: Instant },
}

impl BreakerEvent {
    pub(crate) fn state_transition(name: &str, from: CircuitState, to: CircuitState) -> Self {
        Self::StateTransition { name: name.to_string(), from, to, timestamp: Instant::now() }
    }

    pub(crate) fn call_permitted(name: &str, state: CircuitState) -> Self {
        Self::CallPermitted { name: name.to_string(), state, timestamp: Instant::now() }
    }

    pub(crate) fn call_rejected(name: &str) -> Self {
        Self::CallRejected { name: name.to_string(), timestamp: Instant::now() }
    }

    pub(crate) fn success(name: &str, duration: Duration) -> Self {
        Self::SuccessRecorded { name: name.to_string(), duration, timestamp: Instant::now() }
    }

    pub(crate) fn failure(name: &str, duration: Duration) -> Self {
        Self::FailureRecorded { name: name.to_string(), duration, timestamp: Instant::now() }
    }

    pub(crate) fn slow_call(name: &str, duration: Duration) -> Self {
        Self::SlowCallDetected { name: name.to_string(), duration, timestamp: Instant::now() }
    }

    fn name(&self) -> &str {
        match self {
            Self::StateTransition { name, .. }
            | Self::CallPermitted { name, .. }
            | Self::CallRejected { name, .. }
            | Self::SuccessRecorded { name, .. }
            | Self::FailureRecorded { name, .. }
            | Self::SlowCallDetected { name, .. } => name,
        }
    }
}

impl ResilienceEvent for BreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::StateTransition { .. } => "state_transition",
            Self::CallPermitted { .. } => "call_permitted",
            Self::CallRejected { .. } => "call_rejected",
            Self::SuccessRecorded { .. } => "success",
            Self::FailureRecorded { .. } => "failure",
            Self::SlowCallDetected { .. } => "slow_call",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::StateTransition { timestamp, .. }
            | Self::CallPermitted { timestamp, .. }
            | Self::CallRejected { timestamp, .. }
            | Self::SuccessRecorded { timestamp, .. }
            | Self::FailureRecorded { timestamp, .. }
            | Self::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn component(&self) -> &str {
        self.name()
    }
}
