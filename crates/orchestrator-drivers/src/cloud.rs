//! Optional cloud planner: only engaged when the local complexity heuristic
//! classifies the prompt as [`Complexity::Hard`]; otherwise delegates to the
//! local planner driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_breaker::Breaker;
use orchestrator_core::ErrorClass;
use orchestrator_schema::parse_and_validate;

use crate::heuristic::{classify_complexity, Complexity};
use crate::planner::PlannerDriver;
use crate::{GenerateOutput, Route, Tuning};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1400);

pub struct CloudPlannerDriver {
    http: reqwest::Client,
    generate_url: String,
    breaker: Arc<Breaker>,
    model_id: String,
    local_planner: Arc<PlannerDriver>,
}

impl CloudPlannerDriver {
    pub fn new(
        http: reqwest::Client,
        generate_url: impl Into<String>,
        breaker: Arc<Breaker>,
        model_id: impl Into<String>,
        local_planner: Arc<PlannerDriver>,
    ) -> Self {
        Self { http, generate_url: generate_url.into(), breaker, model_id: model_id.into(), local_planner }
    }

    pub async fn generate(&self, prompt: &str, tuning: Option<&Tuning>) -> GenerateOutput {
        if classify_complexity(prompt) != Complexity::Hard {
            return self.local_planner.generate(prompt, tuning).await;
        }

        let start = Instant::now();
        let max_tokens = tuning.and_then(|t| t.max_tokens).unwrap_or(768);
        let result = self.breaker.guard(|| self.call_remote(prompt, max_tokens)).await;

        let raw = match result {
            Ok(raw) => raw,
            Err(_) => return self.local_planner.generate(prompt, tuning).await,
        };

        match parse_and_validate(&raw, &self.model_id) {
            Ok(outcome) => GenerateOutput {
                text: serde_json::to_string(&outcome.output).unwrap_or(raw),
                model_id: self.model_id.clone(),
                route: Route::Cloud,
                tokens_used: max_tokens,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: true,
                fallback_used: outcome.repaired,
                error_class: None,
            },
            Err(_) => GenerateOutput {
                text: raw,
                model_id: self.model_id.clone(),
                route: Route::Cloud,
                tokens_used: max_tokens,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: false,
                fallback_used: false,
                error_class: Some(ErrorClass::Schema),
            },
        }
    }

    async fn call_remote(&self, prompt: &str, max_tokens: u32) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .post(&self.generate_url)
            .json(&serde_json::json!({ "prompt": prompt, "max_tokens": max_tokens }))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        response.text().await
    }
}
