use std::time::Duration;

/// Per-tier TTLs and tuning knobs for the multi-tier cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub l1_ttl: Duration,
    pub l2_ttl: Duration,
    pub negative_ttl: Duration,
    pub pattern_ttl: Duration,
    pub similarity_threshold: f64,
    pub search_cap: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_ttl: Duration::from_secs(5 * 60),
            l2_ttl: Duration::from_secs(5 * 60),
            negative_ttl: Duration::from_secs(60),
            pattern_ttl: Duration::from_secs(15 * 60),
            similarity_threshold: crate::similarity::DEFAULT_SIMILARITY_THRESHOLD,
            search_cap: 10,
        }
    }
}
