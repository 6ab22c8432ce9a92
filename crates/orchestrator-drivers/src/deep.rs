//! Deep tier: long-form local reasoning. Subject to oracle suppression
//! (enforced by the pipeline, not here) and releases its model handle after
//! an idle timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_breaker::Breaker;
use orchestrator_core::ErrorClass;
use tokio::sync::Mutex;

use crate::{GenerateOutput, Route, Tuning};

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1400);

/// Tracks whether the local model handle is currently "warm". A real driver
/// would hold the loaded weights behind this; here it is a stand-in for
/// whatever resource needs releasing after idling.
struct Handle {
    last_used: Instant,
}

pub struct DeepDriver {
    http: reqwest::Client,
    generate_url: String,
    breaker: Arc<Breaker>,
    model_id: String,
    idle_timeout: Duration,
    handle: Mutex<Option<Handle>>,
}

impl DeepDriver {
    pub fn new(
        http: reqwest::Client,
        generate_url: impl Into<String>,
        breaker: Arc<Breaker>,
        model_id: impl Into<String>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            http,
            generate_url: generate_url.into(),
            breaker,
            model_id: model_id.into(),
            idle_timeout,
            handle: Mutex::new(None),
        }
    }

    pub async fn generate(&self, prompt: &str, tuning: Option<&Tuning>) -> GenerateOutput {
        let start = Instant::now();
        self.touch().await;

        let max_tokens = tuning.and_then(|t| t.max_tokens).unwrap_or(1024);
        let result = self.breaker.guard(|| self.call_remote(prompt, max_tokens)).await;

        match result {
            Ok((text, tokens_used)) => GenerateOutput {
                text,
                model_id: self.model_id.clone(),
                route: Route::Deep,
                tokens_used,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: true,
                fallback_used: false,
                error_class: None,
            },
            Err(err) => GenerateOutput {
                text: String::new(),
                model_id: self.model_id.clone(),
                route: Route::Deep,
                tokens_used: 0,
                latency_ms: start.elapsed().as_millis() as u64,
                schema_ok: false,
                fallback_used: false,
                error_class: Some(if err.is_open() { ErrorClass::CircuitOpen } else { ErrorClass::Exception }),
            },
        }
    }

    /// Releases the model handle if it has sat idle past `idle_timeout`.
    /// Called out-of-band (e.g. from a background sweep), not on every
    /// request.
    pub async fn release_if_idle(&self) -> bool {
        let mut handle = self.handle.lock().await;
        match handle.as_ref() {
            Some(h) if h.last_used.elapsed() >= self.idle_timeout => {
                *handle = None;
                true
            }
            _ => false,
        }
    }

    async fn touch(&self) {
        let mut handle = self.handle.lock().await;
        *handle = Some(Handle { last_used: Instant::now() });
    }

    async fn call_remote(&self, prompt: &str, max_tokens: u32) -> Result<(String, u32), reqwest::Error> {
        let response = self
            .http
            .post(&self.generate_url)
            .json(&serde_json::json!({ "prompt": prompt, "max_tokens": max_tokens }))
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let text = response.text().await?;
        Ok((text, max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_breaker::BreakerConfig;

    fn breaker() -> Arc<Breaker> {
        Arc::new(Breaker::new(BreakerConfig::builder("deep_service").build()))
    }

    #[tokio::test]
    async fn idle_release_is_false_before_timeout() {
        let driver = DeepDriver::new(
            reqwest::Client::new(),
            "http://localhost:9/generate",
            breaker(),
            "deep-v1",
            Duration::from_secs(60),
        );
        driver.touch().await;
        assert!(!driver.release_if_idle().await);
    }

    #[tokio::test]
    async fn idle_release_frees_handle_past_timeout() {
        let driver = DeepDriver::new(
            reqwest::Client::new(),
            "http://localhost:9/generate",
            breaker(),
            "deep-v1",
            Duration::from_millis(1),
        );
        driver.touch().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(driver.release_if_idle().await);
    }
}
