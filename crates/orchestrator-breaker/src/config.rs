use std::time::Duration;

use orchestrator_core::EventListeners;

use crate::events::BreakerEvent;

/// Whether the evaluation window counts the last N calls or the last N
/// seconds of calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlidingWindowType {
    CountBased,
    TimeBased,
}

/// Configuration for a single named circuit breaker instance.
///
/// The orchestrator keeps one of these per protected dependency: the NLU
/// service, the planner tier, and (recommended) one per registered tool.
pub struct BreakerConfig {
    pub name: String,
    pub failure_rate_threshold: f64,
    pub sliding_window_type: SlidingWindowType,
    pub sliding_window_size: usize,
    pub sliding_window_duration: Option<Duration>,
    pub wait_duration_in_open: Duration,
    pub permitted_calls_in_half_open: usize,
    pub minimum_number_of_calls: usize,
    pub slow_call_duration_threshold: Option<Duration>,
    pub slow_call_rate_threshold: f64,
    pub events: EventListeners<BreakerEvent>,
}

impl BreakerConfig {
    pub fn builder(name: impl Into<String>) -> BreakerConfigBuilder {
        BreakerConfigBuilder::new(name)
    }
}

/// Fluent builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    name: String,
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Option<Duration>,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    minimum_number_of_calls: usize,
    slow_call_duration_threshold: Option<Duration>,
    slow_call_rate_threshold: f64,
    events: EventListeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_rate_threshold: 0.5,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 20,
            sliding_window_duration: None,
            wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 3,
            minimum_number_of_calls: 10,
            slow_call_duration_threshold: None,
            slow_call_rate_threshold: 1.0,
            events: EventListeners::new(),
        }
    }

    pub fn failure_rate_threshold(mut self, value: f64) -> Self {
        self.failure_rate_threshold = value;
        self
    }

    pub fn sliding_window_type(mut self, value: SlidingWindowType) -> Self {
        self.sliding_window_type = value;
        self
    }

    pub fn sliding_window_size(mut self, value: usize) -> Self {
        self.sliding_window_size = value;
        self
    }

    pub fn sliding_window_duration(mut self, value: Duration) -> Self {
        self.sliding_window_duration = Some(value);
        self
    }

    pub fn wait_duration_in_open(mut self, value: Duration) -> Self {
        self.wait_duration_in_open = value;
        self
    }

    pub fn permitted_calls_in_half_open(mut self, value: usize) -> Self {
        self.permitted_calls_in_half_open = value;
        self
    }

    pub fn minimum_number_of_calls(mut self, value: usize) -> Self {
        self.minimum_number_of_calls = value;
        self
    }

    pub fn slow_call_duration_threshold(mut self, value: Duration) -> Self {
        self.slow_call_duration_threshold = Some(value);
        self
    }

    pub fn slow_call_rate_threshold(mut self, value: f64) -> Self {
        self.slow_call_rate_threshold = value;
        self
    }

    pub fn on_event<L>(mut self, listener: L) -> Self
    where
        L: orchestrator_core::EventListener<BreakerEvent> + 'static,
    {
        self.events.add(listener);
        self
    }

    /// Panics if `TimeBased` was selected without a window duration, mirroring
    /// the invariant check every sliding-window breaker in this codebase performs.
    pub fn build(self) -> BreakerConfig {
        if self.sliding_window_type == SlidingWindowType::TimeBased
            && self.sliding_window_duration.is_none()
        {
            panic!("sliding_window_duration must be set when sliding_window_type is TimeBased");
        }
        BreakerConfig {
            name: self.name,
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_type: self.sliding_window_type,
            sliding_window_size: self.sliding_window_size,
            sliding_window_duration: self.sliding_window_duration,
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            minimum_number_of_calls: self.minimum_number_of_calls,
            slow_call_duration_threshold: self.slow_call_duration_threshold,
            slow_call_rate_threshold: self.slow_call_rate_threshold,
            events: self.events,
        }
    }
}
