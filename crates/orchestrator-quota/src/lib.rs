//! Route-family quota tracking.
//!
//! The router is free to send most turns to the micro tier, but a run of
//! easy turns must not be allowed to starve the planner/deep tiers of the
//! traffic share they need to stay warm and collect quality signal. This
//! crate tracks, over a sliding time window, what share of routing decisions
//! went to each family, and tells the router when a family's share has
//! exceeded its configured maximum.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Coarse routing tiers the quota is tracked per.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteFamily {
    Micro,
    Planner,
    Deep,
}

impl RouteFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Micro => "micro",
            Self::Planner => "planner",
            Self::Deep => "deep",
        }
    }
}

/// Configuration for a [`QuotaTracker`].
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// How far back decisions are counted.
    pub window: Duration,
    /// Maximum allowed share (0.0-1.0) per family. A family absent from this
    /// map has no ceiling.
    pub max_share: HashMap<RouteFamily, f64>,
    /// A family's share is only evaluated once at least this many decisions
    /// have landed in the window; below this, small samples would make the
    /// ratio meaningless.
    pub minimum_decisions: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        let mut max_share = HashMap::new();
        max_share.insert(RouteFamily::Micro, 0.85);
        Self { window: Duration::from_secs(300), max_share, minimum_decisions: 10 }
    }
}

impl QuotaConfig {
    pub fn builder() -> QuotaConfigBuilder {
        QuotaConfigBuilder::default()
    }
}

#[derive(Debug, Clone)]
pub struct QuotaConfigBuilder {
    config: QuotaConfig,
}

impl Default for QuotaConfigBuilder {
    fn default() -> Self {
        Self { config: QuotaConfig::default() }
    }
}

impl QuotaConfigBuilder {
    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn max_share(mut self, family: RouteFamily, share: f64) -> Self {
        self.config.max_share.insert(family, share);
        self
    }

    pub fn minimum_decisions(mut self, value: usize) -> Self {
        self.config.minimum_decisions = value;
        self
    }

    pub fn build(self) -> QuotaConfig {
        self.config
    }
}

/// Sliding-window log of routing decisions, grouped by family.
///
/// Grounded on the same `VecDeque<Instant>` sliding-log approach used for
/// call-rate tracking elsewhere in this codebase, extended to tag each
/// timestamp with the family it belongs to.
pub struct QuotaTracker {
    config: QuotaConfig,
    log: Mutex<VecDeque<(Instant, RouteFamily)>>,
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig) -> Self {
        Self { config, log: Mutex::new(VecDeque::new()) }
    }

    /// Records that `family` was chosen for the current turn.
    pub fn record(&self, family: RouteFamily) {
        let mut log = self.log.lock().unwrap();
        let now = Instant::now();
        Self::prune(&mut log, now, self.config.window);
        log.push_back((now, family));
    }

    /// Current share of decisions, within the window, that went to `family`.
    /// Returns `0.0` if the window has no decisions yet.
    pub fn share(&self, family: RouteFamily) -> f64 {
        let mut log = self.log.lock().unwrap();
        let now = Instant::now();
        Self::prune(&mut log, now, self.config.window);

        if log.is_empty() {
            return 0.0;
        }
        let matching = log.iter().filter(|(_, f)| *f == family).count();
        matching as f64 / log.len() as f64
    }

    pub fn total_decisions(&self) -> usize {
        let mut log = self.log.lock().unwrap();
        let now = Instant::now();
        Self::prune(&mut log, now, self.config.window);
        log.len()
    }

    /// `true` when `family` has both cleared the minimum sample size and its
    /// share strictly exceeds its configured maximum.
    pub fn exceeded(&self, family: RouteFamily) -> bool {
        let max_share = match self.config.max_share.get(&family) {
            Some(value) => *value,
            None => return false,
        };

        let total = self.total_decisions();
        if total < self.config.minimum_decisions {
            return false;
        }

        self.share(family) > max_share
    }

    fn prune(log: &mut VecDeque<(Instant, RouteFamily)>, now: Instant, window: Duration) {
        while let Some(&(at, _)) = log.front() {
            if now.duration_since(at) > window {
                log.pop_front();
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
    fn share_is_zero_when_empty() {
        let tracker = QuotaTracker::new(QuotaConfig::default());
        assert_eq!(tracker.share(RouteFamily::Micro), 0.0);
        assert!(!tracker.exceeded(RouteFamily::Micro));
    }

    #[test]
    fn does_not_trip_below_minimum_decisions() {
        let config = QuotaConfig::builder()
            .max_share(RouteFamily::Micro, 0.5)
            .minimum_decisions(10)
            .build();
        let tracker = QuotaTracker::new(config);

        for _ in 0..9 {
            tracker.record(RouteFamily::Micro);
        }

        assert!(!tracker.exceeded(RouteFamily::Micro));
    }

    #[test]
    fn trips_when_share_strictly_exceeds_max() {
        let config = QuotaConfig::builder()
            .max_share(RouteFamily::Micro, 0.5)
            .minimum_decisions(10)
            .build();
        let tracker = QuotaTracker::new(config);

        for _ in 0..6 {
            tracker.record(RouteFamily::Micro);
        }
        for _ in 0..4 {
            tracker.record(RouteFamily::Planner);
        }

        assert_eq!(tracker.total_decisions(), 10);
        assert!(tracker.share(RouteFamily::Micro) > 0.5);
        assert!(tracker.exceeded(RouteFamily::Micro));
    }

    #[test]
    fn exactly_at_max_share_does_not_trip() {
        let config = QuotaConfig::builder()
            .max_share(RouteFamily::Micro, 0.5)
            .minimum_decisions(10)
            .build();
        let tracker = QuotaTracker::new(config);

        for _ in 0..5 {
            tracker.record(RouteFamily::Micro);
        }
        for _ in 0..5 {
            tracker.record(RouteFamily::Planner);
        }

        assert!((tracker.share(RouteFamily::Micro) - 0.5).abs() < f64::EPSILON);
        assert!(!tracker.exceeded(RouteFamily::Micro));
    }

    #[test]
    fn families_without_a_configured_ceiling_never_trip() {
        let tracker = QuotaTracker::new(QuotaConfig::default());
        for _ in 0..50 {
            tracker.record(RouteFamily::Deep);
        }
        assert!(!tracker.exceeded(RouteFamily::Deep));
    }
}
