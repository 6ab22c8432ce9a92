//! Tool failure classification and the aggregate (not per-call) circuit that
//! suspends fallback edges when the registry as a whole is unhealthy.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use orchestrator_core::ErrorClass;

/// How a single tool invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFailureKind {
    Timeout,
    RateLimited,
    ServerError,
    Schema,
    Exception,
    Other,
}

impl ToolFailureKind {
    pub fn class(self) -> ErrorClass {
        match self {
            Self::Timeout => ErrorClass::Timeout,
            Self::RateLimited => ErrorClass::RateLimited,
            Self::ServerError => ErrorClass::ServerError,
            Self::Schema => ErrorClass::Schema,
            Self::Exception | Self::Other => ErrorClass::Exception,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("tool failed: {kind:?}: {message}")]
pub struct ToolFailure {
    pub kind: ToolFailureKind,
    pub message: String,
}

impl ToolFailure {
    pub fn new(kind: ToolFailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Tracks tool failures across the whole registry over a sliding window and
/// suspends fallback attempts once the count exceeds a threshold. This is
/// deliberately aggregate rather than per-tool: a single noisy tool doesn't
/// get its own breaker here, only the registry-wide fallback decision does.
pub struct AggregateFailureTracker {
    window: Duration,
    threshold: usize,
    failures: Mutex<VecDeque<Instant>>,
}

impl AggregateFailureTracker {
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self { window, threshold, failures: Mutex::new(VecDeque::new()) }
    }

    pub fn default_window() -> Self {
        Self::new(Duration::from_secs(30), 5)
    }

    pub fn record_failure(&self) {
        let mut failures = self.failures.lock().expect("failure tracker mutex poisoned");
        failures.push_back(Instant::now());
        self.evict(&mut failures);
    }

    /// `true` once failures in the trailing window exceed the threshold;
    /// fallback edges should be skipped while this holds.
    pub fn fallbacks_suspended(&self) -> bool {
        let mut failures = self.failures.lock().expect("failure tracker mutex poisoned");
        self.evict(&mut failures);
        failures.len() > self.threshold
    }

    fn evict(&self, failures: &mut VecDeque<Instant>) {
        let cutoff = Instant::now() - self.window;
        while let Some(&front) = failures.front() {
            if front < cutoff {
                failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_are_not_suspended_below_threshold() {
        let tracker = AggregateFailureTracker::new(Duration::from_secs(30), 5);
        for _ in 0..5 {
            tracker.record_failure();
        }
        assert!(!tracker.fallbacks_suspended());
    }

    #[test]
    fn fallbacks_suspend_once_threshold_is_exceeded() {
        let tracker = AggregateFailureTracker::new(Duration::from_secs(30), 5);
        for _ in 0..6 {
            tracker.record_failure();
        }
        assert!(tracker.fallbacks_suspended());
    }

    #[test]
    fn old_failures_fall_out_of_the_window() {
        let tracker = AggregateFailureTracker::new(Duration::from_millis(20), 1);
        tracker.record_failure();
        tracker.record_failure();
        std::thread::sleep(Duration::from_millis(40));
        assert!(!tracker.fallbacks_suspended());
    }
}
