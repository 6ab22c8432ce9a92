//! Enum-remap repair: maps placeholders and near-miss enum spellings onto
//! the canonical v4 values before the second (and final) strict parse.
//!
//! Every entry here exists because it was observed from a planner driver in
//! practice; add new entries rather than making the match fuzzy, so the
//! remap table stays an explicit, auditable list.

use serde_json::Value;

const TOOL_REMAP: &[(&str, &str)] = &[
    ("create_calendar_draft", "calendar.create_draft"),
    ("calendar_create_draft", "calendar.create_draft"),
    ("create_email_draft", "email.create_draft"),
    ("email_create_draft", "email.create_draft"),
    ("lookup_weather", "weather.lookup"),
    ("weather_lookup", "weather.lookup"),
    ("query_memory", "memory.query"),
    ("memory_query", "memory.query"),
    ("<enum>", "none"),
    ("null", "none"),
];

const INTENT_REMAP: &[(&str, &str)] = &[
    ("create_calendar_draft", "calendar"),
    ("create_email_draft", "email"),
    ("lookup_weather", "weather"),
    ("query_memory", "memory"),
    ("<enum>", "none"),
    ("null", "none"),
];

const RENDER_INSTRUCTION_REMAP: &[(&str, &str)] = &[
    ("<enum>", "none"),
    ("null", "none"),
    ("none_needed", "none"),
    ("no_render", "none"),
];

fn remap_field(value: &mut Value, field: &str, table: &[(&str, &str)]) {
    let Some(obj) = value.as_object_mut() else { return };
    let Some(current) = obj.get(field).and_then(Value::as_str) else { return };

    for (from, to) in table {
        if current.eq_ignore_ascii_case(from) {
            obj.insert(field.to_string(), Value::String((*to).to_string()));
            return;
        }
    }
}

/// Applies the tool / intent / render_instruction remap tables in place.
pub fn remap_enums(value: &mut Value) {
    remap_field(value, "tool", TOOL_REMAP);
    remap_field(value, "intent", INTENT_REMAP);
    remap_field(value, "render_instruction", RENDER_INSTRUCTION_REMAP);
}
