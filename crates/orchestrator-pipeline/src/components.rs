use std::sync::Arc;

use orchestrator_bandit::BanditClient;
use orchestrator_cache::Cache;
use orchestrator_drivers::{CloudPlannerDriver, DeepDriver, MicroDriver, PlannerDriver};
use orchestrator_events::TurnEventSink;
use orchestrator_nlu::NluClient;
use orchestrator_oracle::OracleClient;
use orchestrator_quota::QuotaTracker;
use orchestrator_security::SecurityMode;
use orchestrator_tools::{Executor, ToolRegistry};

use crate::perf::PerformanceTracker;

/// Process-wide components created once at startup and passed explicitly
/// into every pipeline run; nothing here is rediscovered via an ambient
/// singleton.
pub struct PipelineComponents {
    pub oracle: Arc<OracleClient>,
    pub nlu: Arc<NluClient>,
    pub quota: Arc<QuotaTracker>,
    pub cache: Arc<Cache>,
    pub tools: Arc<ToolRegistry>,
    pub executor: Arc<Executor>,
    pub micro_driver: Arc<MicroDriver>,
    pub planner_driver: Arc<PlannerDriver>,
    pub deep_driver: Arc<DeepDriver>,
    pub cloud_driver: Option<Arc<CloudPlannerDriver>>,
    pub bandit: Option<Arc<BanditClient>>,
    pub events: TurnEventSink,
    pub security_mode: SecurityMode,
    pub energy_base_watts: f64,
    pub performance: PerformanceTracker,
}
