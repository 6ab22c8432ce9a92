//! Process configuration, read once at startup from the environment.
//!
//! Every variable is optional; a missing value falls back to a default
//! tuned for a local development deployment. Nothing here is reloaded at
//! runtime — a config change means a restart.

use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub ollama_base_url: String,
    pub llm_micro: String,
    pub llm_planner: String,
    pub llm_deep: String,
    pub llm_timeout_ms: u64,
    pub llm_keep_alive: String,
    pub nlu_url: String,
    pub nlu_timeout_ms: u64,
    pub redis_url: String,
    pub cache_semantic_threshold: f64,
    pub micro_max_share: f64,
    pub planner_timeout_ms: u64,
    pub log_dir: String,
    pub security_enforce: bool,
    pub openai_api_key: Option<String>,
    pub bandit_base_url: Option<String>,
    pub bandit_timeout_ms: u64,
    pub canary_share: f64,
    pub energy_base_watts: f64,
}

impl Config {
    /// Reads every recognized variable from the process environment.
    /// Never fails: unset or unparsable values silently take their default.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("ORCHESTRATOR_BIND_ADDR", "0.0.0.0:8070"),
            ollama_base_url: env_string("OLLAMA_BASE_URL", "http://localhost:11434"),
            llm_micro: env_string("LLM_MICRO", "micro-v1"),
            llm_planner: env_string("LLM_PLANNER", "planner-v2"),
            llm_deep: env_string("LLM_DEEP", "deep-v1"),
            llm_timeout_ms: env_u64("LLM_TIMEOUT_MS", 1400),
            llm_keep_alive: env_string("LLM_KEEP_ALIVE", "5m"),
            nlu_url: env_string("NLU_URL", "http://localhost:8081"),
            nlu_timeout_ms: env_u64("NLU_TIMEOUT_MS", 80),
            redis_url: env_string("REDIS_URL", "redis://127.0.0.1:6379"),
            cache_semantic_threshold: env_f64("CACHE_SEMANTIC_THRESHOLD", 0.85),
            micro_max_share: env_f64("MICRO_MAX_SHARE", 0.20),
            planner_timeout_ms: env_u64("PLANNER_TIMEOUT_MS", 1400),
            log_dir: env_string("LOG_DIR", "./logs"),
            security_enforce: std::env::var("SECURITY_ENFORCE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            bandit_base_url: std::env::var("BANDIT_BASE_URL").ok(),
            bandit_timeout_ms: env_u64("BANDIT_TIMEOUT_MS", 40),
            canary_share: env_f64("CANARY_SHARE", 0.05),
            energy_base_watts: env_f64("ENERGY_BASE_WATTS", 15.0),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn nlu_timeout(&self) -> Duration {
        Duration::from_millis(self.nlu_timeout_ms)
    }
}
