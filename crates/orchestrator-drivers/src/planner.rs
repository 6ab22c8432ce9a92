//! Planner tier: JSON-only output validated against the v4 schema, with the
//! bounded repair pass baked into `orchestrator_schema::parse_and_validate`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_breaker::Breaker;
use orchestrator_core::ErrorClass;
use orchestrator_schema::parse_and_validate;
use serde_json::json;

use crate::{GenerateOutput, Route, Tuning};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(900);

pub struct PlannerDriver {
    http: reqwest::Client,
    generate_url: String,
    breaker: Arc<Breaker>,
    model_id: String,
}

impl PlannerDriver {
    pub fn new(http: reqwest::Client, generate_url: impl Into<String>, breaker: Arc<Breaker>, model_id: impl Into<String>) -> Self {
        Self { http, generate_url: generate_url.into(), breaker, model_id: model_id.into() }
    }

    pub async fn generate(&self, prompt: &str, tuning: Option<&Tuning>) -> GenerateOutput {
        let start = Instant::now();
        let max_tokens = tuning.and_then(|t| t.max_tokens).unwrap_or(512);

        let result = self
            .breaker
            .guard(|| self.call_remote(prompt, max_tokens))
            .await;

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                return GenerateOutput {
                    text: String::new(),
                    model_id: self.model_id.clone(),
                    route: Route::Planner,
                    tokens_used: 0,
                    latency_ms: start.elapsed().as_millis() as u64,
                    schema_ok: false,
                    fallback_used: false,
                    error_class: Some(if err.is_open() { ErrorClass::CircuitOpen } else { ErrorClass::Exception }),
                };
            }
        };

        match parse_and_validate(&raw, &self.model_id) {
            Ok(outcome) => GenerateOutput {
                text: serde_json::to_string(&outcome.output).unwrap_or(raw),
                model_id: self.model_id.clone(),
                route: Route::Planner,
                tokens_used: max_tokens,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: true,
                fallback_used: outcome.repaired,
                error_class: None,
            },
            Err(_) => GenerateOutput {
                text: raw,
                model_id: self.model_id.clone(),
                route: Route::Planner,
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
            .json(&json!({ "prompt": prompt, "max_tokens": max_tokens }))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        response.text().await
    }
}
