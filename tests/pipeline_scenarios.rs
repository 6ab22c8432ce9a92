//! Cross-crate end-to-end scenarios exercising the assembled pipeline
//! against `wiremock`-backed stand-ins for the oracle, NLU, and
//! model-runtime HTTP dependencies. Every scenario here also touches the
//! cache tier's real Redis connection, so each is `#[ignore]`d pending a
//! locally reachable instance (`REDIS_URL`, default
//! `redis://127.0.0.1:6379/`).

mod support;

use std::time::Duration;

use orchestrator_pipeline::{run_chat, PipelineOutcome};
use serde_json::json;
use support::Env;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn stub_oracle_normal(env: &Env) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "NORMAL" })))
        .mount(&env.oracle)
        .await;
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn cache_hit_micro_greeting() {
    let env = Env::new().await;
    stub_oracle_normal(&env).await;

    Mock::given(method("POST"))
        .and(path("/api/nlu/parse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": { "label": "greeting.hello", "confidence": 0.95, "validated": true },
            "slots": {},
            "route_hint": "micro",
        })))
        .mount(&env.nlu)
        .await;

    let components = env.components().await;
    components
        .cache
        .set(
            "greeting.hello",
            "Hej",
            &json!({ "text": "Hej! Vad kan jag hjälpa dig med?" }),
            "micro-v1",
            orchestrator_schema::SCHEMA_VERSION,
        )
        .await;

    let outcome = run_chat(&components, support::chat_request("s1", "Hej")).await;
    match outcome {
        PipelineOutcome::Admitted { response, headers } => {
            assert_eq!(headers.x_route, "cache");
            assert!(response.response.contains("Hej!"));
            assert_eq!(response.metadata["cache_hit"], json!(true));
        }
        _ => panic!("expected an admitted response from a warm cache"),
    }
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn micro_quota_forces_planner() {
    let env = Env::new().await;
    stub_oracle_normal(&env).await;

    Mock::given(method("POST"))
        .and(path("/planner/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"intent":"none","tool":"none","args":{},"render_instruction":"none","meta":{"version":"4.0","model_id":"planner-v2","schema_version":"v4"}}"#,
        ))
        .mount(&env.llm)
        .await;

    let components = env.components().await;
    for _ in 0..10 {
        components.quota.record(orchestrator_quota::RouteFamily::Micro);
    }

    let outcome = run_chat(&components, support::chat_request("s2", "boka mötet imorgon")).await;
    match outcome {
        PipelineOutcome::Admitted { headers, .. } => {
            assert_eq!(headers.x_route, "planner");
            assert_eq!(headers.x_route_hint.as_deref(), Some("MICRO quota exceeded"));
        }
        _ => panic!("expected an admitted response once the quota pushes the decision to planner"),
    }
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn planner_schema_repair() {
    let env = Env::new().await;
    stub_oracle_normal(&env).await;

    Mock::given(method("POST"))
        .and(path("/planner/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"intent":"calendar","tool":"create_calendar_draft","args":{},"render_instruction":"<enum>","meta":{}}"#,
        ))
        .mount(&env.llm)
        .await;

    let components = env.components().await;
    let outcome = run_chat(&components, support::chat_request_forced("s3", "boka ett möte", "planner")).await;

    match outcome {
        PipelineOutcome::Admitted { response, .. } => {
            assert!(response.response.contains("calendar.create_draft"));
            assert!(response.response.contains("\"render_instruction\":\"none\""));
            assert_eq!(response.metadata["schema_ok"], json!(true));
        }
        _ => panic!("expected a successful response after schema repair"),
    }
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn oracle_demote_deep() {
    let env = Env::new().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "BROWNOUT" })))
        .mount(&env.oracle)
        .await;

    Mock::given(method("POST"))
        .and(path("/planner/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"intent":"none","tool":"none","args":{},"render_instruction":"none","meta":{"version":"4.0","model_id":"planner-v2","schema_version":"v4"}}"#,
        ))
        .mount(&env.llm)
        .await;

    let components = env.components().await;
    let outcome = run_chat(&components, support::chat_request_forced("s4", "sammanfatta läget", "deep")).await;

    match outcome {
        PipelineOutcome::Admitted { response, headers } => {
            assert_eq!(headers.x_route, "planner");
            assert_eq!(response.metadata["blocked_by_guardian"], json!(true));
        }
        _ => panic!("expected an admitted response with the deep tier demoted"),
    }
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn nlu_timeout_fails_open() {
    let env = Env::new().await;
    stub_oracle_normal(&env).await;

    Mock::given(method("POST"))
        .and(path("/api/nlu/parse"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)).set_body_json(json!({
            "intent": { "label": "greeting.hello", "confidence": 0.95, "validated": true },
            "slots": {},
            "route_hint": "micro",
        })))
        .mount(&env.nlu)
        .await;

    Mock::given(method("POST"))
        .and(path("/micro/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "GREETING" })))
        .mount(&env.llm)
        .await;

    let components = env.components().await;
    let outcome = run_chat(&components, support::chat_request("s5", "Hej!")).await;

    match outcome {
        PipelineOutcome::Admitted { response, headers } => {
            assert_eq!(headers.x_route, "micro");
            assert_eq!(response.metadata["nlu_source"], json!("keyword_fallback"));
        }
        _ => panic!("expected the request to complete despite the NLU timeout"),
    }
}

#[tokio::test]
#[ignore = "requires a reachable Redis instance for the cache tier"]
async fn circuit_opens_and_blocks_planner() {
    let env = Env::new().await;
    stub_oracle_normal(&env).await;

    Mock::given(method("POST"))
        .and(path("/planner/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/micro/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "GREETING" })))
        .mount(&env.llm)
        .await;

    let components = env.components_with_planner_breaker(support::fast_tripping_breaker("planner_service")).await;

    // Two direct failures trip the breaker before the turn under test runs.
    for _ in 0..2 {
        let output = components.planner_driver.generate("varm upp kretsen", None).await;
        assert!(output.is_failure());
    }

    let outcome = run_chat(&components, support::chat_request_forced("s6", "boka ett möte", "planner")).await;
    match outcome {
        PipelineOutcome::Admitted { response, headers } => {
            assert_eq!(headers.x_route, "micro");
            assert_eq!(response.metadata["fallback_used"], json!(true));
        }
        _ => panic!("expected the turn to fall back to the micro tier once the circuit is open"),
    }
}
