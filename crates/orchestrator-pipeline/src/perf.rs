//! Rolling end-to-end latency counters surfaced on the monitoring endpoint.
//! Deliberately not a histogram: three atomics are enough to answer "is this
//! deployment slow" without pulling in a metrics backend dependency here.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct PerformanceTracker {
    count: AtomicU64,
    sum_ms: AtomicU64,
    max_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct PerformanceSnapshot {
    pub turns: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
}

impl PerformanceTracker {
    pub fn record(&self, elapsed_ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.max_ms.fetch_max(elapsed_ms, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let turns = self.count.load(Ordering::Relaxed);
        let sum_ms = self.sum_ms.load(Ordering::Relaxed);
        let avg_latency_ms = if turns == 0 { 0.0 } else { sum_ms as f64 / turns as f64 };
        PerformanceSnapshot { turns, avg_latency_ms, max_latency_ms: self.max_ms.load(Ordering::Relaxed) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_and_tracks_the_max() {
        let tracker = PerformanceTracker::default();
        tracker.record(100);
        tracker.record(300);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.turns, 2);
        assert_eq!(snapshot.avg_latency_ms, 200.0);
        assert_eq!(snapshot.max_latency_ms, 300);
    }

    #[test]
    fn empty_tracker_reports_zero() {
        let tracker = PerformanceTracker::default();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.turns, 0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
    }
}
