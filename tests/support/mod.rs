//! Shared harness for the cross-crate pipeline scenarios: wiremock
//! stand-ins for the oracle, NLU, and model-runtime HTTP dependencies, plus
//! a real Redis connection for the cache tier.
//!
//! `REDIS_URL` (default `redis://127.0.0.1:6379/`) must point at a reachable
//! instance; every scenario built from this harness is `#[ignore]`d for
//! that reason.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orchestrator_breaker::{Breaker, BreakerConfig};
use orchestrator_cache::{Cache, CacheConfig};
use orchestrator_drivers::{DeepDriver, MicroDriver, PlannerDriver};
use orchestrator_events::TurnEventSink;
use orchestrator_nlu::NluClient;
use orchestrator_oracle::OracleClient;
use orchestrator_pipeline::{ChatRequest, PipelineComponents};
use orchestrator_quota::{QuotaConfig, QuotaTracker, RouteFamily};
use orchestrator_security::SecurityMode;
use orchestrator_tools::{ToolFailure, ToolFailureKind, ToolHandler, ToolRegistry, ToolSpec};
use redis::aio::ConnectionManager;
use serde_json::Value;
use wiremock::MockServer;

pub fn breaker(name: &str) -> Arc<Breaker> {
    Arc::new(Breaker::new(BreakerConfig::builder(name).build()))
}

/// A breaker tuned to open after two consecutive failures, for the
/// circuit-opens-blocks-planner scenario.
pub fn fast_tripping_breaker(name: &str) -> Arc<Breaker> {
    Arc::new(Breaker::new(
        BreakerConfig::builder(name)
            .sliding_window_size(2)
            .minimum_number_of_calls(2)
            .failure_rate_threshold(0.5)
            .wait_duration_in_open(Duration::from_secs(30))
            .build(),
    ))
}

struct UnavailableTool;

#[async_trait]
impl ToolHandler for UnavailableTool {
    async fn invoke(&self, _args: Value) -> Result<Value, ToolFailure> {
        Err(ToolFailure::new(ToolFailureKind::ServerError, "no backing service in this harness"))
    }
}

pub struct Env {
    pub oracle: MockServer,
    pub nlu: MockServer,
    pub llm: MockServer,
}

impl Env {
    pub async fn new() -> Self {
        Self {
            oracle: MockServer::start().await,
            nlu: MockServer::start().await,
            llm: MockServer::start().await,
        }
    }

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
    }

    /// Builds a full `PipelineComponents`, wiring the micro/planner/deep
    /// drivers to distinct paths on the shared `llm` mock server so a test
    /// can stub each tier independently.
    pub async fn components(&self) -> PipelineComponents {
        self.components_with_planner_breaker(breaker("planner_service")).await
    }

    pub async fn components_with_planner_breaker(&self, planner_breaker: Arc<Breaker>) -> PipelineComponents {
        let http = reqwest::Client::new();

        let redis_client = redis::Client::open(Self::redis_url()).expect("valid redis url");
        let conn = ConnectionManager::new(redis_client)
            .await
            .expect("a local Redis instance is reachable for this integration test");
        let cache = Arc::new(Cache::new(conn, CacheConfig::default()));

        let oracle = Arc::new(OracleClient::new(self.oracle.uri()));
        let nlu = Arc::new(NluClient::with_timeout(self.nlu.uri(), breaker("nlu_service"), Duration::from_millis(80)));

        let quota = Arc::new(QuotaTracker::new(
            QuotaConfig::builder().max_share(RouteFamily::Micro, 0.2).minimum_decisions(10).build(),
        ));

        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("calendar.create_draft", Arc::new(UnavailableTool)));
        registry.register(ToolSpec::new("memory.query", Arc::new(UnavailableTool)));
        let tools = Arc::new(registry);
        let executor = Arc::new(orchestrator_tools::Executor::new(orchestrator_tools::ExecutorConfig::default()));

        let micro_driver = Arc::new(MicroDriver::new(
            http.clone(),
            format!("{}/micro/generate", self.llm.uri()),
            breaker("micro_service"),
            "micro-v1",
        ));
        let planner_driver = Arc::new(PlannerDriver::new(
            http.clone(),
            format!("{}/planner/generate", self.llm.uri()),
            planner_breaker,
            "planner-v2",
        ));
        let deep_driver = Arc::new(DeepDriver::new(
            http.clone(),
            format!("{}/deep/generate", self.llm.uri()),
            breaker("deep_service"),
            "deep-v1",
            Duration::from_secs(300),
        ));

        let events = TurnEventSink::new(std::env::temp_dir().join("orchestrator-tests-events"));

        PipelineComponents {
            oracle,
            nlu,
            quota,
            cache,
            tools,
            executor,
            micro_driver,
            planner_driver,
            deep_driver,
            cloud_driver: None,
            bandit: None,
            events,
            security_mode: SecurityMode::Permissive,
            energy_base_watts: 5.0,
            performance: orchestrator_pipeline::PerformanceTracker::default(),
        }
    }
}

pub fn chat_request(session_id: &str, message: &str) -> ChatRequest {
    serde_json::from_value(serde_json::json!({
        "v": "1",
        "session_id": session_id,
        "message": message,
    }))
    .expect("well-formed chat request literal")
}

pub fn chat_request_forced(session_id: &str, message: &str, force_route: &str) -> ChatRequest {
    serde_json::from_value(serde_json::json!({
        "v": "1",
        "session_id": session_id,
        "message": message,
        "force_route": force_route,
    }))
    .expect("well-formed chat request literal")
}
