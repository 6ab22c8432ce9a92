//! Startup wiring: turns [`Config`] into the [`PipelineComponents`] every
//! request handler shares.

use std::sync::Arc;

use orchestrator_bandit::BanditClient;
use orchestrator_breaker::{BreakerConfig, BreakerRegistry};
use orchestrator_cache::{Cache, CacheConfig};
use orchestrator_drivers::{CloudPlannerDriver, DeepDriver, MicroDriver, PlannerDriver};
use orchestrator_events::TurnEventSink;
use orchestrator_nlu::NluClient;
use orchestrator_oracle::OracleClient;
use orchestrator_pipeline::{PerformanceTracker, PipelineComponents};
use orchestrator_quota::{QuotaConfig, QuotaTracker, RouteFamily};
use orchestrator_security::SecurityMode;
use orchestrator_tools::{Executor, ExecutorConfig, ToolRegistry};
use redis::aio::ConnectionManager;
use std::time::Duration;

use crate::config::Config;
use crate::tools;

/// Everything a request handler needs, beyond the pipeline's own
/// components: the config it was built from and the breaker registry, so
/// `/api/monitoring/circuit-breakers` can read every named breaker's state
/// without the pipeline crate needing to know that endpoint exists.
pub struct AppState {
    pub components: Arc<PipelineComponents>,
    pub breakers: Arc<BreakerRegistry>,
    pub config: Arc<Config>,
}

/// Builds every process-wide component from `config`. Redis connection
/// failures are fatal at startup: a cache this system can't fail open into
/// existing is a misconfiguration, not a degraded mode.
pub async fn build(config: Config) -> anyhow::Result<AppState> {
    let http = reqwest::Client::new();

    let mut breakers = BreakerRegistry::new();
    let nlu_breaker = breakers.register(BreakerConfig::builder("nlu_service").build());
    let planner_breaker = breakers.register(
        BreakerConfig::builder("planner_service")
            .failure_rate_threshold(0.5)
            .sliding_window_size(10)
            .minimum_number_of_calls(5)
            .wait_duration_in_open(Duration::from_secs(5))
            .build(),
    );
    let deep_breaker = breakers.register(BreakerConfig::builder("deep_service").build());
    let cloud_breaker = breakers.register(BreakerConfig::builder("cloud_planner_service").build());
    let micro_breaker = breakers.register(BreakerConfig::builder("micro_service").build());

    let oracle = Arc::new(OracleClient::new(config.ollama_base_url.clone()));
    let nlu = Arc::new(NluClient::with_timeout(config.nlu_url.clone(), nlu_breaker, config.nlu_timeout()));

    let quota = Arc::new(QuotaTracker::new(
        QuotaConfig::builder().minimum_decisions(10).max_share(RouteFamily::Micro, config.micro_max_share).build(),
    ));

    let redis_client = redis::Client::open(config.redis_url.clone())?;
    let conn = ConnectionManager::new(redis_client).await?;
    let cache = Arc::new(Cache::new(
        conn,
        CacheConfig { similarity_threshold: config.cache_semantic_threshold, ..CacheConfig::default() },
    ));

    let mut tool_registry = ToolRegistry::new();
    tools::register_default_tools(&mut tool_registry, http.clone());
    let tools = Arc::new(tool_registry);
    let executor = Arc::new(Executor::new(ExecutorConfig {
        total_timeout: Duration::from_millis(1500),
        ..ExecutorConfig::default()
    }));

    let micro_driver = Arc::new(MicroDriver::new(
        http.clone(),
        format!("{}/api/generate", config.ollama_base_url.trim_end_matches('/')),
        micro_breaker,
        config.llm_micro.clone(),
    ));
    let planner_driver = Arc::new(PlannerDriver::new(
        http.clone(),
        format!("{}/api/generate", config.ollama_base_url.trim_end_matches('/')),
        planner_breaker,
        config.llm_planner.clone(),
    ));
    let deep_driver = Arc::new(DeepDriver::new(
        http.clone(),
        format!("{}/api/generate", config.ollama_base_url.trim_end_matches('/')),
        deep_breaker,
        config.llm_deep.clone(),
        Duration::from_secs(300),
    ));

    let cloud_driver = config.openai_api_key.as_ref().map(|_| {
        Arc::new(CloudPlannerDriver::new(
            http.clone(),
            "https://api.openai.com/v1/chat/completions",
            cloud_breaker,
            "gpt-4o-mini",
            Arc::clone(&planner_driver),
        ))
    });

    let bandit = config.bandit_base_url.as_ref().map(|base| {
        Arc::new(
            BanditClient::new(http.clone(), format!("{base}/decide"), format!("{base}/reward"))
                .with_canary_share(config.canary_share)
                .with_timeout(Duration::from_millis(config.bandit_timeout_ms)),
        )
    });

    let events = TurnEventSink::new(&config.log_dir);
    let security_mode = if config.security_enforce { SecurityMode::Strict } else { SecurityMode::Permissive };

    let components = PipelineComponents {
        oracle,
        nlu,
        quota,
        cache,
        tools,
        executor,
        micro_driver,
        planner_driver,
        deep_driver,
        cloud_driver,
        bandit,
        events,
        security_mode,
        energy_base_watts: config.energy_base_watts,
        performance: PerformanceTracker::default(),
    };

    Ok(AppState { components: Arc::new(components), breakers: Arc::new(breakers), config: Arc::new(config) })
}
