//! The orchestrator's per-request state machine: security scrub, admission,
//! routing, cache, driver dispatch, and tool execution, composed into one
//! turn. Every dependency failure degrades the response rather than
//! propagating; the ultimate fallback is a canned apology.

mod components;
mod perf;
mod request;

pub use components::PipelineComponents;
pub use perf::{PerformanceSnapshot, PerformanceTracker};
pub use request::{ChatRequest, ChatResponse, ResponseHeaders};

use orchestrator_bandit::RewardInputs;
use orchestrator_core::{ErrorClass, TraceId};
use orchestrator_drivers::{apology_fallback, GenerateOutput, Route};
use orchestrator_events::{EnergyMeter, RagStats, ToolCallRecord, TurnEvent};
use orchestrator_router::{NluHint, RouteClass};
use orchestrator_schema::{PlannerOutput, Tool};
use orchestrator_security::RiskLevel;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

/// Whole-turn budget for the planner-path body (driver call plus any tool
/// execution). Narrower than a single driver's own timeout, since it has to
/// account for both the generation call and whatever tool step follows it.
const PIPELINE_BUDGET: Duration = Duration::from_millis(1500);

/// What the pipeline ultimately did, independent of whether it succeeded:
/// used by both the HTTP layer (for headers) and the caller that decides
/// whether to surface a non-200 status.
pub enum PipelineOutcome {
    Admitted { response: ChatResponse, headers: ResponseHeaders },
    AdmissionDenied { retry_after_secs: u64 },
    Invalid { reason: String },
}

fn model_id_for(class: RouteClass) -> &'static str {
    match class {
        RouteClass::Micro => "micro-v1",
        RouteClass::Planner => "planner-v2",
        RouteClass::Deep => "deep-v1",
    }
}

/// The tier that actually produced a generation, which can differ from the
/// routed `final_class` once the fallback matrix has stepped down a tier.
fn route_str(route: Route) -> &'static str {
    match route {
        Route::Micro => "micro",
        Route::Planner => "planner",
        Route::Deep => "deep",
        Route::Cloud => "cloud",
    }
}

fn parse_forced_route(model: Option<&str>, force_route: Option<&str>) -> Option<RouteClass> {
    let raw = force_route.or(model)?;
    RouteClass::parse(raw)
}

fn nlu_hint_from(result: &orchestrator_nlu::NluResult) -> NluHint {
    let class = match result.route_hint {
        orchestrator_nlu::RouteHint::Micro => RouteClass::Micro,
        orchestrator_nlu::RouteHint::Planner => RouteClass::Planner,
        orchestrator_nlu::RouteHint::Deep => RouteClass::Deep,
    };
    NluHint { class, confidence: result.intent.confidence }
}

fn tool_dotted_name(tool: Tool) -> Option<String> {
    if matches!(tool, Tool::None) {
        return None;
    }
    serde_json::to_value(tool).ok().and_then(|v| v.as_str().map(str::to_string))
}

/// Maps a tool failure's classification onto the closed set of error-class
/// strings the turn-event contract allows; anything outside the set a tool
/// can actually fail with collapses to `"other"`.
fn tool_call_error_class(class: ErrorClass) -> String {
    match class {
        ErrorClass::Timeout => "timeout",
        ErrorClass::RateLimited => "429",
        ErrorClass::ServerError => "5xx",
        ErrorClass::Schema => "schema",
        ErrorClass::Exception => "exception",
        _ => "other",
    }
    .to_string()
}

/// Runs one turn end to end.
pub async fn run_chat(components: &PipelineComponents, request: ChatRequest) -> PipelineOutcome {
    let start = Instant::now();
    let trace_id = TraceId::new();
    let energy_meter = EnergyMeter::start(components.energy_base_watts);

    if let Err(reason) = request.validate() {
        return PipelineOutcome::Invalid { reason };
    }

    let combined_text = format!("{} {}", request.message, request.context_text());
    let security_verdict = orchestrator_security::review(&combined_text, RiskLevel::Medium, components.security_mode);

    if let Err(retry_after) = components.oracle.admit().await {
        return PipelineOutcome::AdmissionDenied { retry_after_secs: retry_after.as_secs() };
    }

    let lang = request.lang.as_deref().unwrap_or("sv");

    // NLU parsing and the keyword-based router score have no data dependency
    // on each other; only the override step after them needs both ready.
    let (nlu_result, base_decision) = tokio::join!(
        components.nlu.parse(&request.message, lang, &request.session_id),
        async { orchestrator_router::score_text(&request.message, &components.quota) }
    );

    let forced_route = parse_forced_route(request.model.as_deref(), request.force_route.as_deref());
    let hint = nlu_hint_from(&nlu_result);
    let decision = orchestrator_router::combine(forced_route, Some(hint), base_decision, &components.quota);

    // Canary slice: a session-hashed share of traffic is handed to the
    // bandit service instead of trusting the rule-based decision above.
    let bandit_decision = match &components.bandit {
        Some(bandit) => bandit.decide(&request.session_id, &request.message).await,
        None => None,
    };
    let routed_class = bandit_decision.as_ref().and_then(|d| RouteClass::parse(&d.route_class)).unwrap_or(decision.class);

    let oracle_state = components.oracle.state().await;
    let (final_class, blocked_by_guardian) = if routed_class == RouteClass::Deep && oracle_state != orchestrator_oracle::HealthState::Normal {
        (RouteClass::Planner, true)
    } else {
        (routed_class, false)
    };

    let intent_label = if nlu_result.intent.validated {
        nlu_result.intent.label.clone()
    } else {
        "unknown".to_string()
    };
    let model_id = model_id_for(final_class);

    let cache_result = components.cache.get(&intent_label, &request.message, model_id, orchestrator_schema::SCHEMA_VERSION).await;

    if cache_result.hit {
        let payload = cache_result.payload.unwrap_or(Value::Null);
        let response_text = payload.get("text").and_then(Value::as_str).unwrap_or("").to_string();

        let metadata = json!({
            "cache_hit": true,
            "security_requires_confirmation": security_verdict.requires_confirmation,
            "blocked_by_guardian": blocked_by_guardian,
            "nlu_source": nlu_result.source.as_str(),
        });

        let latency_ms = start.elapsed().as_millis() as u64;
        let event = TurnEvent {
            version: String::new(),
            timestamp: String::new(),
            trace_id: trace_id.to_string(),
            session_id: request.session_id.clone(),
            route: "cache".to_string(),
            e2e_ms_first: latency_ms,
            e2e_ms_full: latency_ms,
            ram_peak: orchestrator_events::sample_ram_peak(),
            tool_calls: Vec::new(),
            energy_wh: energy_meter.stop(),
            oracle_state: oracle_state.as_str().to_string(),
            pii_masked: true,
            consent_scopes: vec!["basic_logging".to_string()],
            rag_stats: RagStats::default(),
            input_text: request.message.clone(),
            output_text: response_text.clone(),
            language: lang.to_string(),
        }
        .stamp();
        components.events.record(&event).await;
        components.performance.record(latency_ms);

        return PipelineOutcome::Admitted {
            response: ChatResponse {
                v: "1".to_string(),
                session_id: request.session_id,
                response: response_text,
                model_used: model_id.to_string(),
                latency_ms,
                trace_id: trace_id.to_string(),
                metadata,
            },
            headers: ResponseHeaders {
                x_trace_id: trace_id.to_string(),
                x_route: "cache".to_string(),
                x_intent: Some(intent_label),
                x_intent_confidence: Some(nlu_result.intent.confidence),
                x_route_hint: Some(decision.reason.clone()),
            },
        };
    }

    if security_verdict.requires_confirmation {
        let metadata = json!({
            "cache_hit": false,
            "security_requires_confirmation": true,
            "blocked_by_guardian": blocked_by_guardian,
        });

        return PipelineOutcome::Admitted {
            response: ChatResponse {
                v: "1".to_string(),
                session_id: request.session_id,
                response: "Den här åtgärden kräver bekräftelse innan jag går vidare.".to_string(),
                model_used: model_id.to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
                trace_id: trace_id.to_string(),
                metadata,
            },
            headers: ResponseHeaders {
                x_trace_id: trace_id.to_string(),
                x_route: final_class.as_str().to_string(),
                x_intent: Some(intent_label),
                x_intent_confidence: Some(nlu_result.intent.confidence),
                x_route_hint: Some(decision.reason),
            },
        };
    }

    let pipeline_result = tokio::time::timeout(PIPELINE_BUDGET, async {
        let generation = generate_with_fallback(components, final_class, &request.message).await;

        let mut tool_step: Option<Value> = None;
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        if generation.route == Route::Planner && generation.schema_ok && !generation.fallback_used {
            if let Ok(plan) = serde_json::from_str::<PlannerOutput>(&generation.text) {
                if let Some(tool_name) = tool_dotted_name(plan.tool) {
                    let outcome = components.executor.execute(&components.tools, &tool_name, plan.args.clone()).await;
                    tool_step = Some(json!({
                        "tool": tool_name,
                        "succeeded": outcome.succeeded(),
                        "fallback_used": outcome.fallback_used,
                    }));
                    tool_calls = outcome
                        .steps
                        .iter()
                        .map(|step| ToolCallRecord {
                            normalized_tool_name: step.tool.clone(),
                            ok: step.error_class.is_none(),
                            error_class: step.error_class.map(tool_call_error_class),
                            latency_ms: step.latency_ms,
                        })
                        .collect();
                }
            }
        }

        (generation, tool_step, tool_calls)
    })
    .await;

    let timed_out = pipeline_result.is_err();
    let (mut generation, tool_step, tool_calls) = pipeline_result.unwrap_or_else(|_elapsed| (apology_fallback(model_id), None, Vec::new()));

    let succeeded = !generation.is_failure() && !timed_out;
    if succeeded {
        components.cache.set(&intent_label, &request.message, &json!({ "text": generation.text }), model_id, orchestrator_schema::SCHEMA_VERSION).await;
    } else if !timed_out {
        components.cache.set_negative(&request.message, &intent_label).await;
        generation = apology_fallback(model_id);
    }
    if timed_out {
        generation.error_class = Some(ErrorClass::Timeout);
    }

    if let (Some(bandit), Some(_)) = (&components.bandit, &bandit_decision) {
        let reward = orchestrator_bandit::compute_reward(RewardInputs {
            latency_ms: start.elapsed().as_millis() as u64,
            latency_budget_ms: PIPELINE_BUDGET.as_millis() as u64,
            energy_estimate: 0.0,
            safety_ok: !blocked_by_guardian,
            schema_ok: generation.schema_ok,
        });
        bandit.post_reward(&request.session_id, reward).await;
    }

    let metadata = json!({
        "cache_hit": false,
        "security_requires_confirmation": false,
        "blocked_by_guardian": blocked_by_guardian,
        "nlu_source": nlu_result.source.as_str(),
        "schema_ok": generation.schema_ok,
        "fallback_used": generation.fallback_used,
        "tool_step": tool_step,
        "timeout_exceeded": timed_out,
        "error_class": generation.error_class.map(ErrorClass::code),
    });

    let latency_ms = start.elapsed().as_millis() as u64;
    let event = TurnEvent {
        version: String::new(),
        timestamp: String::new(),
        trace_id: trace_id.to_string(),
        session_id: request.session_id.clone(),
        route: route_str(generation.route).to_string(),
        e2e_ms_first: latency_ms,
        e2e_ms_full: latency_ms,
        ram_peak: orchestrator_events::sample_ram_peak(),
        tool_calls,
        energy_wh: energy_meter.stop(),
        oracle_state: oracle_state.as_str().to_string(),
        pii_masked: true,
        consent_scopes: vec!["basic_logging".to_string()],
        rag_stats: RagStats::default(),
        input_text: request.message.clone(),
        output_text: generation.text.clone(),
        language: lang.to_string(),
    }
    .stamp();
    components.events.record(&event).await;
    components.performance.record(latency_ms);

    PipelineOutcome::Admitted {
        response: ChatResponse {
            v: "1".to_string(),
            session_id: request.session_id,
            response: generation.text.clone(),
            model_used: generation.model_id.clone(),
            latency_ms,
            trace_id: trace_id.to_string(),
            metadata,
        },
        headers: ResponseHeaders {
            x_trace_id: trace_id.to_string(),
            x_route: route_str(generation.route).to_string(),
            x_intent: Some(intent_label),
            x_intent_confidence: Some(nlu_result.intent.confidence),
            x_route_hint: Some(decision.reason),
        },
    }
}

/// Calls the chosen driver; on failure, steps down one tier at a time
/// (deep -> planner -> micro) before giving up to the canned apology.
async fn generate_with_fallback(components: &PipelineComponents, class: RouteClass, text: &str) -> GenerateOutput {
    let deep_attempt = match class {
        RouteClass::Deep => Some(components.deep_driver.generate(text, None).await),
        _ => None,
    };
    if let Some(output) = deep_attempt {
        if !output.is_failure() {
            return output;
        }
    }

    let planner_attempt = match class {
        RouteClass::Deep | RouteClass::Planner => {
            let output = match &components.cloud_driver {
                Some(cloud) => cloud.generate(text, None).await,
                None => components.planner_driver.generate(text, None).await,
            };
            Some(output)
        }
        _ => None,
    };
    if let Some(mut output) = planner_attempt {
        if !output.is_failure() {
            if class == RouteClass::Deep {
                output.fallback_used = true;
            }
            return output;
        }
    }

    let mut output = components.micro_driver.generate(text, None).await;
    if class != RouteClass::Micro {
        output.fallback_used = true;
    }
    output
}
