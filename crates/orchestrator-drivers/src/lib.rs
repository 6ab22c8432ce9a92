//! Uniform `generate()` contract over the micro/planner/deep/cloud model
//! tiers, plus the fallback matrix that moves a failing call to the next
//! cheaper tier.

mod cloud;
mod deep;
mod heuristic;
mod micro;
mod planner;

pub use cloud::CloudPlannerDriver;
pub use deep::DeepDriver;
pub use heuristic::{classify_complexity, Complexity};
pub use micro::MicroDriver;
pub use planner::PlannerDriver;

use orchestrator_core::ErrorClass;
use serde::{Deserialize, Serialize};

/// Which tier ultimately produced a [`GenerateOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Micro,
    Planner,
    Deep,
    Cloud,
}

/// Optional generation knobs. Every tier ignores fields it has no use for.
#[derive(Debug, Clone, Default)]
pub struct Tuning {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// The uniform output contract every driver returns, success or failure.
/// Drivers never propagate an error upward; a failed call is itself a
/// `GenerateOutput` with `error_class` set and `fallback_used` left for the
/// caller to flip once it has applied the fallback matrix.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub text: String,
    pub model_id: String,
    pub route: Route,
    pub tokens_used: u32,
    pub latency_ms: u64,
    pub schema_ok: bool,
    pub fallback_used: bool,
    pub error_class: Option<ErrorClass>,
}

impl GenerateOutput {
    pub fn is_failure(&self) -> bool {
        self.error_class.is_some()
    }
}

const APOLOGY_SV: &str = "Tyvärr kunde jag inte slutföra det just nu. Försök igen om en liten stund.";

/// The ultimate fallback payload, used when every tier has failed.
pub fn apology_fallback(model_id: &str) -> GenerateOutput {
    GenerateOutput {
        text: APOLOGY_SV.to_string(),
        model_id: model_id.to_string(),
        route: Route::Micro,
        tokens_used: 0,
        latency_ms: 0,
        schema_ok: false,
        fallback_used: true,
        error_class: None,
    }
}

/// Applies the fallback matrix entry "any driver raises -> micro, with
/// `fallback_used = true`" given an already-failed output from a
/// higher tier and a micro-tier retry closure.
pub async fn fall_back_to_micro<F, Fut>(failed: GenerateOutput, retry_with_micro: F) -> GenerateOutput
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = GenerateOutput>,
{
    if !failed.is_failure() {
        return failed;
    }

    let mut retried = retry_with_micro().await;
    retried.fallback_used = true;
    retried
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_output() -> GenerateOutput {
        GenerateOutput {
            text: "ok".to_string(),
            model_id: "micro-v1".to_string(),
            route: Route::Micro,
            tokens_used: 3,
            latency_ms: 10,
            schema_ok: true,
            fallback_used: false,
            error_class: None,
        }
    }

    fn failed_output() -> GenerateOutput {
        GenerateOutput { error_class: Some(ErrorClass::Timeout), ..ok_output() }
    }

    #[tokio::test]
    async fn successful_output_is_returned_unchanged() {
        let out = fall_back_to_micro(ok_output(), || async { ok_output() }).await;
        assert!(!out.fallback_used);
    }

    #[tokio::test]
    async fn failed_output_retries_on_micro_and_flags_fallback_used() {
        let out = fall_back_to_micro(failed_output(), || async { ok_output() }).await;
        assert!(out.fallback_used);
        assert_eq!(out.route, Route::Micro);
    }
}
