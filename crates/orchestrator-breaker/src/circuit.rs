use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BreakerConfig, SlidingWindowType};
use crate::events::BreakerEvent;

/// The three states of a circuit breaker's finite state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    at: Instant,
    failed: bool,
    slow: bool,
}

/// Snapshot of a breaker's counters, useful for `/api/monitoring` surfaces.
#[derive(Debug, Clone, Copy)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_calls: usize,
    pub failed_calls: usize,
    pub slow_calls: usize,
}

/// The breaker's finite state machine and sliding window of call outcomes.
///
/// `state_atomic` mirrors `state` so [`super::Breaker::state_sync`] can be read
/// from non-async contexts (metrics scrapes, health endpoints) without a lock.
pub struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    half_open_calls: usize,
    count_window: VecDeque<(bool, bool)>,
    time_window: VecDeque<CallRecord>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }

    pub fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            half_open_calls: 0,
            count_window: VecDeque::new(),
            time_window: VecDeque::new(),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Called before every dependency call. Returns `false` (and emits
    /// `CallRejected`) if the circuit is open and the wait duration has not
    /// yet elapsed, or if half-open has exhausted its permitted probe calls.
    pub fn try_acquire(&mut self, config: &BreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => {
                config.events.emit(&BreakerEvent::call_permitted(&config.name, self.state));
                true
            }
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.wait_duration_in_open {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.half_open_calls = 1;
                    config.events.emit(&BreakerEvent::call_permitted(&config.name, self.state));
                    true
                } else {
                    config.events.emit(&BreakerEvent::call_rejected(&config.name));
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_calls < config.permitted_calls_in_half_open {
                    self.half_open_calls += 1;
                    config.events.emit(&BreakerEvent::call_permitted(&config.name, self.state));
                    true
                } else {
                    config.events.emit(&BreakerEvent::call_rejected(&config.name));
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self, config: &BreakerConfig, duration: Duration) {
        let slow = config
            .slow_call_duration_threshold
            .is_some_and(|threshold| duration >= threshold);
        if slow {
            config.events.emit(&BreakerEvent::slow_call(&config.name, duration));
        }
        config.events.emit(&BreakerEvent::success(&config.name, duration));
        self.push_record(false, slow);
        self.evaluate(config);
    }

    pub fn record_failure(&mut self, config: &BreakerConfig, duration: Duration) {
        let slow = config
            .slow_call_duration_threshold
            .is_some_and(|threshold| duration >= threshold);
        if slow {
            config.events.emit(&BreakerEvent::slow_call(&config.name, duration));
        }
        config.events.emit(&BreakerEvent::failure(&config.name, duration));
        self.push_record(true, slow);
        self.evaluate(config);
    }

    pub fn force_open(&mut self, config: &BreakerConfig) {
        self.transition_to(CircuitState::Open, config);
    }

    pub fn force_closed(&mut self, config: &BreakerConfig) {
        self.reset(config);
    }

    pub fn reset(&mut self, config: &BreakerConfig) {
        self.count_window.clear();
        self.time_window.clear();
        self.half_open_calls = 0;
        self.transition_to(CircuitState::Closed, config);
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let (total, failed, slow) = match self.state {
            _ if matches!(self.window_type_hint(), SlidingWindowType::TimeBased) => {
                let total = self.time_window.len();
                let failed = self.time_window.iter().filter(|r| r.failed).count();
                let slow = self.time_window.iter().filter(|r| r.slow).count();
                (total, failed, slow)
            }
            _ => {
                let total = self.count_window.len();
                let failed = self.count_window.iter().filter(|(f, _)| *f).count();
                let slow = self.count_window.iter().filter(|(_, s)| *s).count();
                (total, failed, slow)
            }
        };
        CircuitMetrics { state: self.state, total_calls: total, failed_calls: failed, slow_calls: slow }
    }

    fn window_type_hint(&self) -> SlidingWindowType {
        if !self.time_window.is_empty() || self.count_window.is_empty() {
            SlidingWindowType::TimeBased
        } else {
            SlidingWindowType::CountBased
        }
    }

    fn push_record(&mut self, failed: bool, slow: bool) {
        self.count_window.push_back((failed, slow));
        self.time_window.push_back(CallRecord { at: Instant::now(), failed, slow });
    }

    fn prune_time_window(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(front) = self.time_window.front() {
            if now.duration_since(front.at) > window {
                self.time_window.pop_front();
            } else {
                break;
            }
        }
    }

    fn evaluate(&mut self, config: &BreakerConfig) {
        if self.state == CircuitState::Open {
            return;
        }

        let (total, failed, slow) = match config.sliding_window_type {
            SlidingWindowType::CountBased => {
                while self.count_window.len() > config.sliding_window_size {
                    self.count_window.pop_front();
                }
                let total = self.count_window.len();
                let failed = self.count_window.iter().filter(|(f, _)| *f).count();
                let slow = self.count_window.iter().filter(|(_, s)| *s).count();
                (total, failed, slow)
            }
            SlidingWindowType::TimeBased => {
                let window = config.sliding_window_duration.unwrap_or(Duration::from_secs(60));
                self.prune_time_window(window);
                let total = self.time_window.len();
                let failed = self.time_window.iter().filter(|r| r.failed).count();
                let slow = self.time_window.iter().filter(|r| r.slow).count();
                (total, failed, slow)
            }
        };

        if total < config.minimum_number_of_calls {
            if self.state == CircuitState::HalfOpen {
                self.transition_to(CircuitState::Closed, config);
            }
            return;
        }

        let failure_rate = failed as f64 / total as f64;
        let slow_rate = slow as f64 / total as f64;

        let should_open =
            failure_rate >= config.failure_rate_threshold || slow_rate >= config.slow_call_rate_threshold;

        if should_open {
            self.transition_to(CircuitState::Open, config);
        } else if self.state == CircuitState::HalfOpen {
            self.transition_to(CircuitState::Closed, config);
        }
    }

    fn transition_to(&mut self, to: CircuitState, config: &BreakerConfig) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.count_window.clear();
        self.time_window.clear();
        self.half_open_calls = 0;
        config.events.emit(&BreakerEvent::state_transition(&config.name, from, to));
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}
