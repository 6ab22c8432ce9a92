//! Route handlers. Kept thin: request parsing and response shaping only,
//! all actual decision-making lives in `orchestrator_pipeline`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::Router;
use axum::routing::{get, post};
use serde_json::{json, Value};

use orchestrator_pipeline::{run_chat, ChatRequest, PipelineOutcome};
use orchestrator_router::RouteClass;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/ingest", post(ingest))
        .route("/run", post(ingest))
        .route("/tools", get(list_tools))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/memory/:action", post(memory_passthrough))
        .route("/api/monitoring/:facet", get(monitoring))
        .with_state(state)
}

fn error_envelope(code: &str, message: impl Into<String>, retry_after: Option<u64>) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message.into(),
            "retry_after": retry_after,
        }
    })
}

async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    match run_chat(&state.components, request).await {
        PipelineOutcome::Admitted { response, headers } => {
            let mut header_map = HeaderMap::new();
            header_map.insert(HeaderName::from_static("x-trace-id"), header_value(&headers.x_trace_id));
            header_map.insert(HeaderName::from_static("x-route"), header_value(&headers.x_route));
            if let Some(intent) = &headers.x_intent {
                header_map.insert(HeaderName::from_static("x-intent"), header_value(intent));
            }
            if let Some(confidence) = headers.x_intent_confidence {
                header_map.insert(HeaderName::from_static("x-intent-confidence"), header_value(&confidence.to_string()));
            }
            if let Some(hint) = &headers.x_route_hint {
                header_map.insert(HeaderName::from_static("x-route-hint"), header_value(hint));
            }
            (StatusCode::OK, header_map, Json(response)).into_response()
        }
        PipelineOutcome::AdmissionDenied { retry_after_secs } => {
            let mut header_map = HeaderMap::new();
            header_map.insert(HeaderName::from_static("retry-after"), header_value(&retry_after_secs.to_string()));
            (
                StatusCode::SERVICE_UNAVAILABLE,
                header_map,
                Json(error_envelope("admission_denied", "system overloaded, retry later / systemet \u{e4}r \u{f6}verbelastat, f\u{f6}rs\u{f6}k igen senare", Some(retry_after_secs))),
            )
                .into_response()
        }
        PipelineOutcome::Invalid { reason } => {
            (StatusCode::BAD_REQUEST, Json(error_envelope("validation", reason, None))).into_response()
        }
    }
}

fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// Routing preview: runs the same admission + routing decision as `/chat`
/// but never calls a driver or returns a generated response.
async fn ingest(State(state): State<Arc<AppState>>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    if let Err(reason) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(error_envelope("validation", reason, None))).into_response();
    }

    if let Err(retry_after) = state.components.oracle.admit().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(error_envelope("admission_denied", "system overloaded, retry later", Some(retry_after.as_secs()))),
        )
            .into_response();
    }

    let lang = request.lang.as_deref().unwrap_or("sv");
    let nlu_result = state.components.nlu.parse(&request.message, lang, &request.session_id).await;
    let hint = orchestrator_router::NluHint {
        class: match nlu_result.route_hint {
            orchestrator_nlu::RouteHint::Micro => RouteClass::Micro,
            orchestrator_nlu::RouteHint::Planner => RouteClass::Planner,
            orchestrator_nlu::RouteHint::Deep => RouteClass::Deep,
        },
        confidence: nlu_result.intent.confidence,
    };
    let decision = orchestrator_router::decide(&request.message, None, Some(hint), &state.components.quota);

    let priority = match decision.class {
        RouteClass::Micro => 3,
        RouteClass::Planner => 6,
        RouteClass::Deep => 9,
    };
    let estimated_latency_ms = match decision.class {
        RouteClass::Micro => 150,
        RouteClass::Planner => 600,
        RouteClass::Deep => 1400,
    };

    Json(json!({
        "accepted": true,
        "model": decision.class.as_str(),
        "priority": priority,
        "estimated_latency_ms": estimated_latency_ms,
        "reason": decision.reason,
    }))
    .into_response()
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let oracle_state = state.components.oracle.state().await;
    let available = !oracle_state.denies_admission();

    Json(json!({
        "oracle_state": oracle_state.as_str(),
        "tools": [
            { "name": "email.create_draft", "available": available },
            { "name": "calendar.create_draft", "available": available },
            { "name": "weather.lookup", "available": available },
            { "name": "memory.query", "available": available },
        ],
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let reachable = !matches!(
        state.components.oracle.state().await,
        orchestrator_oracle::HealthState::Unreachable | orchestrator_oracle::HealthState::Timeout
    );
    let status = if reachable { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(json!({ "ready": reachable })))
}

/// `POST /api/memory/{store|query|forget}`: pass-through to the memory
/// service, emitting a turn event the same way a chat turn does.
async fn memory_passthrough(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !["store", "query", "forget"].contains(&action.as_str()) {
        return (StatusCode::BAD_REQUEST, Json(error_envelope("validation", format!("unknown memory action {action:?}"), None)))
            .into_response();
    }

    let base = match std::env::var("MEMORY_URL") {
        Ok(base) => base,
        Err(_) => {
            return (StatusCode::OK, Json(json!({ "v": "1", "status": "no_memory_service_configured" }))).into_response()
        }
    };

    let http = reqwest::Client::new();
    let url = format!("{}/{}", base.trim_end_matches('/'), action);
    match http.post(&url).json(&body).send().await {
        Ok(response) if response.status().is_success() => {
            let payload = response.json::<Value>().await.unwrap_or(Value::Null);
            (StatusCode::OK, Json(payload)).into_response()
        }
        _ => (StatusCode::OK, Json(json!({ "v": "1", "status": "memory_service_unavailable" }))).into_response(),
    }
}

/// `GET /api/monitoring/{health|cache|routing|circuit-breakers|performance}`.
async fn monitoring(State(state): State<Arc<AppState>>, Path(facet): Path<String>) -> impl IntoResponse {
    match facet.as_str() {
        "health" => {
            let oracle_state = state.components.oracle.state().await;
            Json(json!({ "oracle_state": oracle_state.as_str() })).into_response()
        }
        "circuit-breakers" => {
            let mut breakers = json!({});
            for name in state.breakers.names() {
                if let Some(breaker) = state.breakers.get(name) {
                    let metrics = breaker.metrics().await;
                    breakers[name] = json!({
                        "state": format!("{:?}", breaker.state_sync()),
                        "success_count": metrics.success_count,
                        "failure_count": metrics.failure_count,
                        "total_calls": metrics.total_calls,
                        "failure_rate": metrics.failure_rate,
                    });
                }
            }
            Json(breakers).into_response()
        }
        "routing" => Json(json!({
            "micro_share": state.components.quota.share(orchestrator_quota::RouteFamily::Micro),
            "planner_share": state.components.quota.share(orchestrator_quota::RouteFamily::Planner),
            "deep_share": state.components.quota.share(orchestrator_quota::RouteFamily::Deep),
            "total_decisions": state.components.quota.total_decisions(),
        }))
        .into_response(),
        "cache" => {
            let stats = state.components.cache.stats();
            Json(json!({
                "l1_hits": stats.l1_hits,
                "l2_hits": stats.l2_hits,
                "negative_hits": stats.negative_hits,
                "pattern_hits": stats.pattern_hits,
                "misses": stats.misses,
                "total_lookups": stats.total_lookups,
            }))
            .into_response()
        }
        "performance" => {
            let snapshot = state.components.performance.snapshot();
            Json(json!({
                "turns": snapshot.turns,
                "avg_latency_ms": snapshot.avg_latency_ms,
                "max_latency_ms": snapshot.max_latency_ms,
            }))
            .into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(error_envelope("validation", format!("unknown monitoring facet {facet:?}"), None)))
            .into_response(),
    }
}
