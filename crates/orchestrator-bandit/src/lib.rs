//! Optional canary bandit client. When enabled, a small session-hashed
//! slice of traffic consults a remote bandit server instead of the
//! rule-based router; everything else is untouched. Every field this
//! produces on the turn event is nullable, since the bandit path is
//! entirely optional.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_CANARY_SHARE: f64 = 0.05;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(40);

/// Reward blend weights. Opaque tunables, not load-bearing semantics.
const WEIGHT_LATENCY: f64 = 0.35;
const WEIGHT_ENERGY: f64 = 0.15;
const WEIGHT_SAFETY: f64 = 0.3;
const WEIGHT_SCHEMA_SUCCESS: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditDecision {
    pub route_class: String,
    pub tool: Option<String>,
    pub method: String,
}

impl BanditDecision {
    fn error_fallback(route_class: impl Into<String>) -> Self {
        Self { route_class: route_class.into(), tool: None, method: "error_fallback".to_string() }
    }
}

/// Inputs used to compute the reward posted back after a turn completes.
#[derive(Debug, Clone, Copy)]
pub struct RewardInputs {
    pub latency_ms: u64,
    pub latency_budget_ms: u64,
    pub energy_estimate: f64,
    pub safety_ok: bool,
    pub schema_ok: bool,
}

/// Returns `true` when `session_id` falls within the canary share.
pub fn is_canary(session_id: &str, canary_share: f64) -> bool {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    session_id.hash(&mut hasher);
    let bucket = (hasher.finish() % 100) as f64 / 100.0;
    bucket < canary_share
}

/// A fixed weighted blend over latency, energy, safety, and schema success,
/// clamped to `[0, 1]`.
pub fn compute_reward(inputs: RewardInputs) -> f64 {
    let latency_score = if inputs.latency_budget_ms == 0 {
        1.0
    } else {
        (1.0 - (inputs.latency_ms as f64 / inputs.latency_budget_ms as f64)).clamp(0.0, 1.0)
    };
    let energy_score = (1.0 - inputs.energy_estimate).clamp(0.0, 1.0);
    let safety_score = if inputs.safety_ok { 1.0 } else { 0.0 };
    let schema_score = if inputs.schema_ok { 1.0 } else { 0.0 };

    (latency_score * WEIGHT_LATENCY
        + energy_score * WEIGHT_ENERGY
        + safety_score * WEIGHT_SAFETY
        + schema_score * WEIGHT_SCHEMA_SUCCESS)
        .clamp(0.0, 1.0)
}

pub struct BanditClient {
    http: reqwest::Client,
    decide_url: String,
    reward_url: String,
    canary_share: f64,
    timeout: Duration,
}

impl BanditClient {
    pub fn new(http: reqwest::Client, decide_url: impl Into<String>, reward_url: impl Into<String>) -> Self {
        Self {
            http,
            decide_url: decide_url.into(),
            reward_url: reward_url.into(),
            canary_share: DEFAULT_CANARY_SHARE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_canary_share(mut self, share: f64) -> Self {
        self.canary_share = share;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` when `session_id` isn't in the canary slice; the caller should
    /// use the rule-based router in that case without consulting the
    /// bandit at all.
    pub async fn decide(&self, session_id: &str, text: &str) -> Option<BanditDecision> {
        if !is_canary(session_id, self.canary_share) {
            return None;
        }

        let request = self
            .http
            .post(&self.decide_url)
            .json(&serde_json::json!({ "session_id": session_id, "text": text }))
            .timeout(self.timeout)
            .send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => match response.error_for_status() {
                Ok(response) => response.json::<BanditDecision>().await.ok().or_else(|| Some(BanditDecision::error_fallback("planner"))),
                Err(_) => Some(BanditDecision::error_fallback("planner")),
            },
            _ => Some(BanditDecision::error_fallback("planner")),
        }
    }

    pub async fn post_reward(&self, session_id: &str, reward: f64) {
        let _ = self
            .http
            .post(&self.reward_url)
            .json(&serde_json::json!({ "session_id": session_id, "reward": reward }))
            .timeout(self.timeout)
            .send()
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canary_share_is_deterministic_for_a_fixed_session() {
        let first = is_canary("session-abc", 0.05);
        let second = is_canary("session-abc", 0.05);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_share_never_selects_canary() {
        assert!(!is_canary("any-session", 0.0));
    }

    #[test]
    fn full_share_always_selects_canary() {
        assert!(is_canary("any-session", 1.0));
    }

    #[test]
    fn reward_is_perfect_when_everything_succeeds_well_within_budget() {
        let reward = compute_reward(RewardInputs {
            latency_ms: 100,
            latency_budget_ms: 1500,
            energy_estimate: 0.0,
            safety_ok: true,
            schema_ok: true,
        });
        assert!(reward > 0.95);
    }

    #[test]
    fn reward_degrades_when_safety_fails() {
        let with_safety = compute_reward(RewardInputs { latency_ms: 100, latency_budget_ms: 1500, energy_estimate: 0.0, safety_ok: true, schema_ok: true });
        let without_safety = compute_reward(RewardInputs { latency_ms: 100, latency_budget_ms: 1500, energy_estimate: 0.0, safety_ok: false, schema_ok: true });
        assert!(without_safety < with_safety);
    }
}
