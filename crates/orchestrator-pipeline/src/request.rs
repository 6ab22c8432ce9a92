use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub v: String,
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub force_route: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

impl ChatRequest {
    /// Validation contract the pipeline enforces before anything else runs.
    pub fn validate(&self) -> Result<(), String> {
        if self.v != "1" {
            return Err(format!("unsupported protocol version {:?}", self.v));
        }
        if self.session_id.trim().is_empty() {
            return Err("session_id must not be empty".to_string());
        }
        if self.message.trim().is_empty() {
            return Err("message must not be empty".to_string());
        }
        Ok(())
    }

    pub fn context_text(&self) -> String {
        self.context
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub v: String,
    pub session_id: String,
    pub response: String,
    pub model_used: String,
    pub latency_ms: u64,
    pub trace_id: String,
    pub metadata: Value,
}

/// Response headers the HTTP layer is responsible for attaching.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    pub x_trace_id: String,
    pub x_route: String,
    pub x_intent: Option<String>,
    pub x_intent_confidence: Option<f64>,
    pub x_route_hint: Option<String>,
}
