//! Client for the remote NLU service, guarded by the `nlu_service` circuit
//! breaker and bounded to a tight deadline so a slow classifier never eats
//! into the pipeline's total request budget.
//!
//! `parse` never fails: on a breaker-open state, timeout, or transport
//! error it falls back to a small keyword classifier and reports that in
//! [`NluResult::source`] so telemetry (`metadata.nlu_source`) can show the
//! degradation.

use std::sync::Arc;
use std::time::Duration;

use orchestrator_breaker::Breaker;
use serde::{Deserialize, Serialize};

/// Coarse tier hint the NLU service (or the fallback classifier) suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteHint {
    Micro,
    Planner,
    Deep,
}

/// Where a given [`NluResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NluSource {
    Remote,
    KeywordFallback,
}

impl NluSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::KeywordFallback => "keyword_fallback",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Intent {
    pub label: String,
    pub confidence: f64,
    pub validated: bool,
}

#[derive(Debug, Clone)]
pub struct NluResult {
    pub intent: Intent,
    pub slots: serde_json::Value,
    pub route_hint: RouteHint,
    pub source: NluSource,
}

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    v: &'a str,
    text: &'a str,
    lang: &'a str,
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    intent: Intent,
    #[serde(default)]
    slots: serde_json::Value,
    route_hint: RouteHint,
}

pub struct NluClient {
    http: reqwest::Client,
    parse_url: String,
    timeout: Duration,
    breaker: Arc<Breaker>,
}

impl NluClient {
    pub fn new(base_url: impl Into<String>, breaker: Arc<Breaker>) -> Self {
        Self::with_timeout(base_url, breaker, Duration::from_millis(80))
    }

    pub fn with_timeout(base_url: impl Into<String>, breaker: Arc<Breaker>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            parse_url: format!("{}/api/nlu/parse", base_url.trim_end_matches('/')),
            timeout,
            breaker,
        }
    }

    pub async fn parse(&self, text: &str, lang: &str, session_id: &str) -> NluResult {
        if !self.breaker.try_acquire().await {
            return keyword_fallback(text);
        }

        let start = std::time::Instant::now();
        let result = self.call_remote(text, lang, session_id).await;
        let elapsed = start.elapsed();

        match result {
            Some(response) => {
                self.breaker.record_success(elapsed).await;
                NluResult {
                    intent: response.intent,
                    slots: response.slots,
                    route_hint: response.route_hint,
                    source: NluSource::Remote,
                }
            }
            None => {
                self.breaker.record_failure(elapsed).await;
                keyword_fallback(text)
            }
        }
    }

    async fn call_remote(&self, text: &str, lang: &str, session_id: &str) -> Option<ParseResponse> {
        let body = ParseRequest { v: "1", text, lang, session_id };
        let response = self
            .http
            .post(&self.parse_url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        response.json::<ParseResponse>().await.ok()
    }
}

/// A tiny keyword classifier used whenever the remote NLU service is
/// unavailable. It is deliberately conservative: anything it doesn't
/// recognize is classified `unknown` with low confidence and routed to
/// `planner`, letting the router's own scoring take over.
pub fn keyword_fallback(text: &str) -> NluResult {
    let lower = text.to_lowercase();
    let (label, confidence, route_hint) = if ["hej", "hallå", "tja", "god morgon"]
        .iter()
        .any(|greeting| lower.contains(greeting))
    {
        ("greeting.hello", 0.6, RouteHint::Micro)
    } else if ["boka", "skicka", "visa", "skapa", "ändra"].iter().any(|verb| lower.contains(verb)) {
        ("action.generic", 0.4, RouteHint::Planner)
    } else if ["förklara", "sammanfatta", "jämför", "varför"].iter().any(|verb| lower.contains(verb)) {
        ("analysis.generic", 0.4, RouteHint::Deep)
    } else {
        ("unknown", 0.2, RouteHint::Planner)
    };

    NluResult {
        intent: Intent { label: label.to_string(), confidence, validated: false },
        slots: serde_json::Value::Object(Default::default()),
        route_hint,
        source: NluSource::KeywordFallback,
    }
}
