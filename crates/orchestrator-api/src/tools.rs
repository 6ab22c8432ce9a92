//! Default tool handlers registered at startup, each a thin HTTP
//! pass-through to a downstream service named after the tool.
//!
//! None of these handlers themselves decide fallback behavior; that's the
//! executor's job once a [`ToolFailure`] bubbles up.

use async_trait::async_trait;
use orchestrator_tools::{ToolFailure, ToolFailureKind, ToolHandler, ToolRegistry, ToolSpec};
use serde_json::Value;
use std::sync::Arc;

struct HttpTool {
    http: reqwest::Client,
    url: String,
}

#[async_trait]
impl ToolHandler for HttpTool {
    async fn invoke(&self, args: Value) -> Result<Value, ToolFailure> {
        let response = self
            .http
            .post(&self.url)
            .json(&args)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ToolFailure::new(ToolFailureKind::Timeout, err.to_string())
                } else {
                    ToolFailure::new(ToolFailureKind::Exception, err.to_string())
                }
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ToolFailure::new(ToolFailureKind::RateLimited, "downstream rate limited"));
        }
        if response.status().is_server_error() {
            return Err(ToolFailure::new(ToolFailureKind::ServerError, response.status().to_string()));
        }
        if !response.status().is_success() {
            return Err(ToolFailure::new(ToolFailureKind::Other, response.status().to_string()));
        }

        response.json::<Value>().await.map_err(|err| ToolFailure::new(ToolFailureKind::Schema, err.to_string()))
    }
}

/// A stub used for tools with no configured backing service: it always
/// degrades, so fallback logic in the executor is exercised even when
/// `MEMORY_URL` / `CALENDAR_URL` / etc. aren't set.
struct UnavailableTool;

#[async_trait]
impl ToolHandler for UnavailableTool {
    async fn invoke(&self, _args: Value) -> Result<Value, ToolFailure> {
        Err(ToolFailure::new(ToolFailureKind::ServerError, "no backing service configured"))
    }
}

fn http_tool(http: &reqwest::Client, env_var: &str, path: &str) -> Arc<dyn ToolHandler> {
    match std::env::var(env_var) {
        Ok(base) => Arc::new(HttpTool { http: http.clone(), url: format!("{}{path}", base.trim_end_matches('/')) }),
        Err(_) => Arc::new(UnavailableTool),
    }
}

/// Registers the four tools the planner output schema can name, each
/// falling back to the corresponding `*.cached` or `*.generic` edge.
pub fn register_default_tools(registry: &mut ToolRegistry, http: reqwest::Client) {
    registry.register(
        ToolSpec::new("email.create_draft", http_tool(&http, "MEMORY_URL", "/email/draft"))
            .with_fallback("memory.query"),
    );
    registry.register(
        ToolSpec::new("calendar.create_draft", http_tool(&http, "MEMORY_URL", "/calendar/draft"))
            .with_fallback("memory.query"),
    );
    registry.register(
        ToolSpec::new("weather.lookup", http_tool(&http, "WEATHER_URL", "/lookup")).with_fallback("weather.cached"),
    );
    registry.register(ToolSpec::new("weather.cached", Arc::new(UnavailableTool)));
    registry.register(ToolSpec::new("memory.query", http_tool(&http, "MEMORY_URL", "/query")));
}
