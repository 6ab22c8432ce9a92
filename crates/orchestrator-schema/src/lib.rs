//! Planner output schema v4: a strict, enumerated contract the planner
//! driver's JSON must satisfy, plus the bounded two-pass repair pipeline
//! (lexical repair, then enum-remap repair) that gives a slightly malformed
//! response one more chance before it is treated as a schema failure.

mod canonicalize;
mod remap;
mod repair;

pub use canonicalize::canonicalize_args;
pub use remap::remap_enums;
pub use repair::lexical_repair;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_VERSION: &str = "v4";
pub const META_VERSION: &str = "4.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Email,
    Calendar,
    Weather,
    Memory,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Tool {
    #[serde(rename = "email.create_draft")]
    EmailCreateDraft,
    #[serde(rename = "calendar.create_draft")]
    CalendarCreateDraft,
    #[serde(rename = "weather.lookup")]
    WeatherLookup,
    #[serde(rename = "memory.query")]
    MemoryQuery,
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderInstruction {
    Chart,
    Map,
    Scene,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    pub version: String,
    pub model_id: String,
    pub schema_version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerOutput {
    pub intent: Intent,
    pub tool: Tool,
    pub args: Value,
    pub render_instruction: RenderInstruction,
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("response was not valid JSON even after lexical repair")]
    NotJson,
    #[error("response did not satisfy the v4 schema after repair: {0}")]
    Invalid(String),
}

/// Outcome of [`parse_and_validate`]: whether a repair pass was needed, for
/// telemetry (`schema_ok`, and whether repair was used, per turn).
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub output: PlannerOutput,
    pub repaired: bool,
}

/// Validates `raw` against the v4 schema. On a direct parse failure, applies
/// lexical repair then enum-remap repair and attempts exactly one more
/// parse; a second failure is a schema-class error, full stop — there is no
/// third attempt.
pub fn parse_and_validate(raw: &str, model_id: &str) -> Result<ParseOutcome, SchemaError> {
    if let Ok(output) = strict_parse(raw) {
        return Ok(ParseOutcome { output, repaired: false });
    }

    let repaired_text = lexical_repair(raw);
    let mut value: Value = serde_json::from_str(&repaired_text).map_err(|_| SchemaError::NotJson)?;

    remap_enums(&mut value);
    fill_meta_defaults(&mut value, model_id);
    if let Some(tool) = value.get("tool").and_then(Value::as_str).map(str::to_string) {
        if let Some(args) = value.get_mut("args") {
            canonicalize_args(&tool, args, model_id);
        }
    }

    let output: PlannerOutput =
        serde_json::from_value(value).map_err(|err| SchemaError::Invalid(err.to_string()))?;

    Ok(ParseOutcome { output, repaired: true })
}

fn strict_parse(raw: &str) -> Result<PlannerOutput, serde_json::Error> {
    serde_json::from_str(raw)
}

/// A response that omits or blanks `meta` entirely still gets the required
/// version markers, so repair doesn't fail a response solely for leaving
/// out fields the schema itself dictates.
fn fill_meta_defaults(value: &mut Value, model_id: &str) {
    let meta = value
        .as_object_mut()
        .and_then(|obj| {
            if !obj.contains_key("meta") || !obj["meta"].is_object() {
                obj.insert("meta".to_string(), Value::Object(Default::default()));
            }
            obj.get_mut("meta")
        })
        .and_then(Value::as_object_mut);

    if let Some(meta) = meta {
        meta.entry("version").or_insert_with(|| Value::String(META_VERSION.to_string()));
        meta.entry("schema_version").or_insert_with(|| Value::String(SCHEMA_VERSION.to_string()));
        meta.entry("model_id").or_insert_with(|| Value::String(model_id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_response() {
        let raw = r#"{
            "intent": "calendar",
            "tool": "calendar.create_draft",
            "args": {},
            "render_instruction": "none",
            "meta": { "version": "4.0", "model_id": "planner-v2", "schema_version": "v4" }
        }"#;

        let outcome = parse_and_validate(raw, "planner-v2").unwrap();
        assert!(!outcome.repaired);
        assert_eq!(outcome.output.tool, Tool::CalendarCreateDraft);
    }

    #[test]
    fn rejects_unknown_enum_values_even_after_repair() {
        let raw = r#"{
            "intent": "carpentry",
            "tool": "calendar.create_draft",
            "args": {},
            "render_instruction": "none",
            "meta": { "version": "4.0", "model_id": "planner-v2", "schema_version": "v4" }
        }"#;

        assert!(parse_and_validate(raw, "planner-v2").is_err());
    }

    #[test]
    fn rejects_unknown_fields() {
        let raw = r#"{
            "intent": "none",
            "tool": "none",
            "args": {},
            "render_instruction": "none",
            "meta": { "version": "4.0", "model_id": "planner-v2", "schema_version": "v4" },
            "extra_field": true
        }"#;

        assert!(parse_and_validate(raw, "planner-v2").is_err());
    }

    #[test]
    fn repairs_a_near_miss_tool_name_and_placeholder_render_instruction() {
        let raw = r#"{"intent":"calendar","tool":"create_calendar_draft","args":{},"render_instruction":"<enum>","meta":{}}"#;

        let outcome = parse_and_validate(raw, "planner-v2").unwrap();
        assert!(outcome.repaired);
        assert_eq!(outcome.output.tool, Tool::CalendarCreateDraft);
        assert_eq!(outcome.output.render_instruction, RenderInstruction::None);
        assert_eq!(outcome.output.meta.version, META_VERSION);
        assert_eq!(outcome.output.meta.schema_version, SCHEMA_VERSION);
    }
}
