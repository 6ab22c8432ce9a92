//! Planner step executor: runs a tool under a timeout budget, falling back
//! to a per-tool fallback edge on failure when the aggregate tool circuit
//! allows it.

use std::time::{Duration, Instant};

use orchestrator_core::ErrorClass;
use serde_json::Value;

use crate::failure::{AggregateFailureTracker, ToolFailureKind};
use crate::registry::ToolRegistry;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub max_steps: usize,
    pub total_timeout: Duration,
    pub tool_timeout: Duration,
    pub fallback_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: 2,
            total_timeout: Duration::from_millis(1500),
            tool_timeout: Duration::from_millis(400),
            fallback_timeout: Duration::from_millis(300),
        }
    }
}

/// One attempted step: either the primary tool or a fallback edge. `tool` is
/// normalized to `"other"` when the name isn't in the registry, so a typo'd
/// or since-removed tool name can't blow up telemetry cardinality.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub tool: String,
    pub is_fallback: bool,
    pub error_class: Option<ErrorClass>,
    pub latency_ms: u64,
}

/// Full outcome of running a plan through the executor.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub result: Option<Value>,
    pub steps: Vec<StepOutcome>,
    pub fallback_used: bool,
    pub timeout_exceeded: bool,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_some()
    }
}

pub struct Executor {
    config: ExecutorConfig,
    failures: AggregateFailureTracker,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { failures: AggregateFailureTracker::default_window(), config }
    }

    /// Runs `tool_name` with `args`, consulting its fallback edge on
    /// failure. Never panics; every failure path yields a classified
    /// [`StepOutcome`] rather than propagating.
    pub async fn execute(&self, registry: &ToolRegistry, tool_name: &str, args: Value) -> ExecutionOutcome {
        let deadline = Instant::now() + self.config.total_timeout;
        let mut steps = Vec::new();

        let Some(spec) = registry.get(tool_name) else {
            steps.push(StepOutcome { tool: "other".to_string(), is_fallback: false, error_class: Some(ErrorClass::Schema), latency_ms: 0 });
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: false };
        };

        let primary_timeout = remaining(deadline).min(self.config.tool_timeout);
        let step_started = Instant::now();
        match run_step(spec.handler.as_ref(), args.clone(), primary_timeout).await {
            Ok(value) => {
                steps.push(StepOutcome {
                    tool: tool_name.to_string(),
                    is_fallback: false,
                    error_class: None,
                    latency_ms: step_started.elapsed().as_millis() as u64,
                });
                return ExecutionOutcome { result: Some(value), steps, fallback_used: false, timeout_exceeded: false };
            }
            Err(kind) => {
                self.failures.record_failure();
                steps.push(StepOutcome {
                    tool: tool_name.to_string(),
                    is_fallback: false,
                    error_class: Some(kind.class()),
                    latency_ms: step_started.elapsed().as_millis() as u64,
                });
            }
        }

        if Instant::now() >= deadline {
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: true };
        }

        if steps.len() >= self.config.max_steps {
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: false };
        }

        let Some(fallback_name) = spec.fallback.clone() else {
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: false };
        };

        if self.failures.fallbacks_suspended() {
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: false };
        }

        let Some(fallback_spec) = registry.get(&fallback_name) else {
            steps.push(StepOutcome { tool: "other".to_string(), is_fallback: true, error_class: Some(ErrorClass::Schema), latency_ms: 0 });
            return ExecutionOutcome { result: None, steps, fallback_used: false, timeout_exceeded: false };
        };

        let fallback_timeout = remaining(deadline).min(self.config.fallback_timeout);
        let step_started = Instant::now();
        match run_step(fallback_spec.handler.as_ref(), args, fallback_timeout).await {
            Ok(value) => {
                steps.push(StepOutcome {
                    tool: fallback_name,
                    is_fallback: true,
                    error_class: None,
                    latency_ms: step_started.elapsed().as_millis() as u64,
                });
                ExecutionOutcome { result: Some(value), steps, fallback_used: true, timeout_exceeded: false }
            }
            Err(kind) => {
                self.failures.record_failure();
                steps.push(StepOutcome {
                    tool: fallback_name,
                    is_fallback: true,
                    error_class: Some(kind.class()),
                    latency_ms: step_started.elapsed().as_millis() as u64,
                });
                let timeout_exceeded = Instant::now() >= deadline;
                ExecutionOutcome { result: None, steps, fallback_used: true, timeout_exceeded }
            }
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

async fn run_step(
    handler: &dyn crate::registry::ToolHandler,
    args: Value,
    timeout: Duration,
) -> Result<Value, ToolFailureKind> {
    match tokio::time::timeout(timeout, handler.invoke(args)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => Err(failure.kind),
        Err(_elapsed) => Err(ToolFailureKind::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::ToolFailure;
    use crate::registry::{ToolHandler, ToolRegistry, ToolSpec};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct AlwaysOk;

    #[async_trait]
    impl ToolHandler for AlwaysOk {
        async fn invoke(&self, args: Value) -> Result<Value, ToolFailure> {
            Ok(args)
        }
    }

    struct AlwaysFails(ToolFailureKind);

    #[async_trait]
    impl ToolHandler for AlwaysFails {
        async fn invoke(&self, _args: Value) -> Result<Value, ToolFailure> {
            Err(ToolFailure::new(self.0, "synthetic failure"))
        }
    }

    struct AlwaysSlow;

    #[async_trait]
    impl ToolHandler for AlwaysSlow {
        async fn invoke(&self, args: Value) -> Result<Value, ToolFailure> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(args)
        }
    }

    fn config() -> ExecutorConfig {
        ExecutorConfig { max_steps: 2, total_timeout: Duration::from_millis(200), tool_timeout: Duration::from_millis(20), fallback_timeout: Duration::from_millis(20) }
    }

    #[tokio::test]
    async fn missing_tool_yields_schema_failure() {
        let executor = Executor::new(config());
        let registry = ToolRegistry::new();
        let outcome = executor.execute(&registry, "does.not.exist", json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.steps[0].error_class, Some(ErrorClass::Schema));
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let executor = Executor::new(config());
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("weather.lookup", Arc::new(AlwaysOk)));
        let outcome = executor.execute(&registry, "weather.lookup", json!({"location": "Lund"})).await;
        assert!(outcome.succeeded());
        assert!(!outcome.fallback_used);
        assert_eq!(outcome.steps.len(), 1);
    }

    #[tokio::test]
    async fn failure_falls_back_when_edge_is_configured() {
        let executor = Executor::new(config());
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("weather.lookup", Arc::new(AlwaysFails(ToolFailureKind::ServerError))).with_fallback("weather.cached"));
        registry.register(ToolSpec::new("weather.cached", Arc::new(AlwaysOk)));

        let outcome = executor.execute(&registry, "weather.lookup", json!({})).await;
        assert!(outcome.succeeded());
        assert!(outcome.fallback_used);
        assert_eq!(outcome.steps.len(), 2);
    }

    #[tokio::test]
    async fn slow_primary_call_times_out() {
        let executor = Executor::new(config());
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("weather.lookup", Arc::new(AlwaysSlow)));

        let outcome = executor.execute(&registry, "weather.lookup", json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.steps[0].error_class, Some(ErrorClass::Timeout));
    }

    #[tokio::test]
    async fn no_fallback_edge_stops_after_one_step() {
        let executor = Executor::new(config());
        let mut registry = ToolRegistry::new();
        registry.register(ToolSpec::new("weather.lookup", Arc::new(AlwaysFails(ToolFailureKind::Exception))));

        let outcome = executor.execute(&registry, "weather.lookup", json!({})).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.steps.len(), 1);
    }
}
