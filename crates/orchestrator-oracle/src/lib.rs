//! Client for the system-health oracle that the pipeline consults before
//! admitting a turn.
//!
//! The oracle is polled over HTTP rather than pushed to, so every admission
//! check would otherwise cost a round trip on the hot path. Instead this
//! client caches the last snapshot for a short TTL and serves reads from
//! that cache; a background-refreshed snapshot is always a few hundred
//! milliseconds stale, which is an acceptable trade against adding latency
//! to every turn.
//!
//! The oracle is an advisory availability hint, not a consistency boundary:
//! on a failed poll the client synthesizes an error-surrogate state
//! (`Timeout`, `Unreachable`, `Error`) rather than denying admission, so a
//! network blip never stops a healthy system from admitting turns. Only the
//! oracle's own `Emergency`/`Lockdown` states deny admission.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

/// Health states reported by the oracle, plus the error surrogates this
/// client synthesizes when a poll fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthState {
    Normal,
    Brownout,
    Degraded,
    Emergency,
    Lockdown,
    #[serde(skip_deserializing)]
    Timeout,
    #[serde(skip_deserializing)]
    Unreachable,
    #[serde(skip_deserializing)]
    Error,
}

impl HealthState {
    /// Wire label, also used as the `oracle_state` value on turn events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Brownout => "BROWNOUT",
            Self::Degraded => "DEGRADED",
            Self::Emergency => "EMERGENCY",
            Self::Lockdown => "LOCKDOWN",
            Self::Timeout => "TIMEOUT",
            Self::Unreachable => "UNREACHABLE",
            Self::Error => "ERROR",
        }
    }

    /// Fixed retry-after table from the admission-control contract.
    pub fn retry_after(self) -> Duration {
        let seconds = match self {
            Self::Normal => 0,
            Self::Brownout => 1,
            Self::Degraded => 5,
            Self::Emergency => 30,
            Self::Lockdown => 60,
            Self::Timeout => 2,
            Self::Unreachable => 10,
            Self::Error => 5,
        };
        Duration::from_secs(seconds)
    }

    /// `true` only for the two states that deny admission outright.
    pub fn denies_admission(self) -> bool {
        matches!(self, Self::Emergency | Self::Lockdown)
    }

    /// `true` when a `deep`-routed turn must be demoted to `planner`.
    pub fn demotes_deep(self) -> bool {
        self != Self::Normal
    }
}

/// Coarse tier hint independent of the router's own scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedTier {
    Micro,
    Planner,
}

/// Recommends a tier from the oracle state and current memory pressure,
/// independent of what the router policy would otherwise have chosen.
pub fn recommended_tier(state: HealthState, memory_pressure: f64, memory_pressure_threshold: f64) -> RecommendedTier {
    if state == HealthState::Brownout || memory_pressure > memory_pressure_threshold {
        RecommendedTier::Micro
    } else if state == HealthState::Degraded {
        RecommendedTier::Planner
    } else {
        RecommendedTier::Micro
    }
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    state: HealthState,
    #[serde(default)]
    ram_pct: Option<f64>,
    #[serde(default)]
    cpu_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    state: HealthState,
    ram_pct: f64,
    fetched_at: Instant,
}

/// Polls `GET {base_url}/health` and caches the result for `ttl` (default 1s).
pub struct OracleClient {
    http: reqwest::Client,
    health_url: String,
    ttl: Duration,
    request_timeout: Duration,
    memory_pressure_threshold: f64,
    cache: Mutex<Option<Snapshot>>,
}

impl OracleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_options(base_url, Duration::from_secs(1), Duration::from_millis(300), 0.9)
    }

    pub fn with_options(
        base_url: impl Into<String>,
        ttl: Duration,
        request_timeout: Duration,
        memory_pressure_threshold: f64,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            health_url: format!("{}/health", base_url.trim_end_matches('/')),
            ttl,
            request_timeout,
            memory_pressure_threshold,
            cache: Mutex::new(None),
        }
    }

    /// Returns the current health state, refreshing the cache if it is stale.
    pub async fn state(&self) -> HealthState {
        self.snapshot().await.state
    }

    /// Returns `Ok(())` if a turn may be admitted, `Err(retry_after)` otherwise.
    pub async fn admit(&self) -> Result<(), Duration> {
        let state = self.state().await;
        if state.denies_admission() {
            Err(state.retry_after())
        } else {
            Ok(())
        }
    }

    pub async fn recommended_tier(&self) -> RecommendedTier {
        let snapshot = self.snapshot().await;
        recommended_tier(snapshot.state, snapshot.ram_pct, self.memory_pressure_threshold)
    }

    pub async fn demotes_deep(&self) -> bool {
        self.state().await.demotes_deep()
    }

    /// Single-flight: the cache lock is held across the poll itself, so
    /// concurrent callers that all see a stale cache queue behind the first
    /// one rather than each issuing their own `/health` request.
    async fn snapshot(&self) -> Snapshot {
        let mut cache = self.cache.lock().await;
        if let Some(snapshot) = cache.filter(|snapshot| snapshot.fetched_at.elapsed() < self.ttl) {
            return snapshot;
        }

        let snapshot = match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(synthesized_state) => Snapshot { state: synthesized_state, ram_pct: 0.0, fetched_at: Instant::now() },
        };

        *cache = Some(snapshot);
        snapshot
    }

    /// `Ok` on a successful poll; `Err(surrogate_state)` classifies the failure.
    async fn fetch(&self) -> Result<Snapshot, HealthState> {
        let response = self
            .http
            .get(&self.health_url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|err| if err.is_timeout() { HealthState::Timeout } else { HealthState::Unreachable })?;

        if !response.status().is_success() {
            return Err(HealthState::Error);
        }

        let body: HealthResponse = response.json().await.map_err(|_| HealthState::Error)?;
        Ok(Snapshot {
            state: body.state,
            ram_pct: body.ram_pct.unwrap_or(0.0),
            fetched_at: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_matches_the_fixed_table() {
        assert_eq!(HealthState::Normal.retry_after(), Duration::from_secs(0));
        assert_eq!(HealthState::Brownout.retry_after(), Duration::from_secs(1));
        assert_eq!(HealthState::Degraded.retry_after(), Duration::from_secs(5));
        assert_eq!(HealthState::Emergency.retry_after(), Duration::from_secs(30));
        assert_eq!(HealthState::Lockdown.retry_after(), Duration::from_secs(60));
        assert_eq!(HealthState::Timeout.retry_after(), Duration::from_secs(2));
        assert_eq!(HealthState::Unreachable.retry_after(), Duration::from_secs(10));
        assert_eq!(HealthState::Error.retry_after(), Duration::from_secs(5));
    }

    #[test]
    fn only_emergency_and_lockdown_deny_admission() {
        for state in [
            HealthState::Normal,
            HealthState::Brownout,
            HealthState::Degraded,
            HealthState::Timeout,
            HealthState::Unreachable,
            HealthState::Error,
        ] {
            assert!(!state.denies_admission(), "{state:?} should not deny admission");
        }
        assert!(HealthState::Emergency.denies_admission());
        assert!(HealthState::Lockdown.denies_admission());
    }

    #[test]
    fn any_non_normal_state_demotes_deep() {
        assert!(!HealthState::Normal.demotes_deep());
        assert!(HealthState::Brownout.demotes_deep());
        assert!(HealthState::Degraded.demotes_deep());
        assert!(HealthState::Emergency.demotes_deep());
    }

    #[test]
    fn recommended_tier_follows_the_precedence_table() {
        assert_eq!(recommended_tier(HealthState::Brownout, 0.1, 0.9), RecommendedTier::Micro);
        assert_eq!(recommended_tier(HealthState::Normal, 0.95, 0.9), RecommendedTier::Micro);
        assert_eq!(recommended_tier(HealthState::Degraded, 0.1, 0.9), RecommendedTier::Planner);
        assert_eq!(recommended_tier(HealthState::Normal, 0.1, 0.9), RecommendedTier::Micro);
    }

    #[tokio::test]
    async fn fails_open_when_oracle_is_unreachable() {
        let client = OracleClient::new("http://127.0.0.1:1");
        assert_eq!(client.state().await, HealthState::Unreachable);
        assert!(client.admit().await.is_ok());
    }
}
