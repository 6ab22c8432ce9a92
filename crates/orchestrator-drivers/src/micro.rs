//! Micro tier: constrained decoding to one of a small set of tool-intent
//! tokens, deterministically mapped to a canonical structured output.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_breaker::Breaker;
use orchestrator_core::ErrorClass;
use orchestrator_schema::canonicalize_args;
use serde_json::{json, Value};

use crate::{GenerateOutput, Route, Tuning};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// A constrained-decoding token and the canonical tool it maps to.
fn token_to_tool(token: &str) -> (&'static str, &'static str, &'static str) {
    match token {
        "GREETING" => ("none", "none", "none"),
        "CALENDAR_DRAFT" => ("calendar", "calendar.create_draft", "none"),
        "WEATHER_LOOKUP" => ("weather", "weather.lookup", "none"),
        "EMAIL_DRAFT" => ("email", "email.create_draft", "none"),
        "MEMORY_QUERY" => ("memory", "memory.query", "none"),
        _ => ("none", "none", "none"),
    }
}

pub struct MicroDriver {
    http: reqwest::Client,
    decode_url: String,
    breaker: Arc<Breaker>,
    model_id: String,
}

impl MicroDriver {
    pub fn new(http: reqwest::Client, decode_url: impl Into<String>, breaker: Arc<Breaker>, model_id: impl Into<String>) -> Self {
        Self { http, decode_url: decode_url.into(), breaker, model_id: model_id.into() }
    }

    pub async fn generate(&self, prompt: &str, _tuning: Option<&Tuning>) -> GenerateOutput {
        let start = Instant::now();
        let result = self
            .breaker
            .guard(|| self.decode(prompt))
            .await;

        match result {
            Ok((text, tokens_used)) => GenerateOutput {
                text,
                model_id: self.model_id.clone(),
                route: Route::Micro,
                tokens_used,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: true,
                fallback_used: false,
                error_class: None,
            },
            Err(err) => GenerateOutput {
                text: String::new(),
                model_id: self.model_id.clone(),
                route: Route::Micro,
                tokens_used: 0,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: false,
                fallback_used: false,
                error_class: Some(if err.is_open() { ErrorClass::CircuitOpen } else { ErrorClass::Exception }),
            },
        }
    }

    async fn decode(&self, prompt: &str) -> Result<(String, u32), reqwest::Error> {
        let response = self
            .http
            .post(&self.decode_url)
            .json(&json!({ "prompt": prompt }))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let token = body.get("token").and_then(Value::as_str).unwrap_or("UNKNOWN");
        let (intent, tool, render_instruction) = token_to_tool(token);

        let mut args = json!({});
        canonicalize_args(tool, &mut args, &self.model_id);

        let structured = json!({
            "intent": intent,
            "tool": tool,
            "args": args,
            "render_instruction": render_instruction,
            "meta": { "version": "4.0", "model_id": self.model_id, "schema_version": "v4" },
        });

        Ok((structured.to_string(), 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_token_maps_to_canonical_tool() {
        assert_eq!(token_to_tool("CALENDAR_DRAFT"), ("calendar", "calendar.create_draft", "none"));
    }

    #[test]
    fn unknown_token_maps_to_none() {
        assert_eq!(token_to_tool("GARBAGE"), ("none", "none", "none"));
    }
}
