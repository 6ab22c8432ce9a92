//! Tool-specific argument canonicalization, applied before every validation
//! attempt (both the direct-parse path and the repaired path).

use chrono::{Duration as ChronoDuration, Timelike, Utc};
use serde_json::{json, Value};

/// Fills in tool-specific defaults for missing/null argument fields, drops
/// `null`-valued entries, and sorts keys for deterministic serialization.
pub fn canonicalize_args(tool: &str, args: &mut Value, _model_id: &str) {
    if !args.is_object() {
        *args = Value::Object(Default::default());
    }

    // Nulls are dropped first so a field the model explicitly sent as
    // `null` is treated the same as a field it omitted entirely: both get
    // the tool's default rather than surfacing a literal null.
    drop_nulls(args);

    match tool {
        "calendar.create_draft" => canonicalize_calendar_draft(args),
        "weather.lookup" => canonicalize_weather_lookup(args),
        "email.create_draft" => canonicalize_email_draft(args),
        _ => {}
    }

    sort_keys(args);
}

fn canonicalize_calendar_draft(args: &mut Value) {
    let obj = args.as_object_mut().expect("ensured object above");

    obj.entry("start_iso").or_insert_with(|| Value::String(next_rounded_slot().to_rfc3339()));
    obj.entry("duration_min").or_insert_with(|| json!(30));
    obj.entry("timezone").or_insert_with(|| Value::String("Europe/Stockholm".to_string()));
    obj.entry("attendees").or_insert_with(|| Value::Array(Vec::new()));
}

fn canonicalize_weather_lookup(args: &mut Value) {
    let obj = args.as_object_mut().expect("ensured object above");
    obj.entry("location").or_insert_with(|| Value::String("Stockholm".to_string()));
    obj.entry("unit").or_insert_with(|| Value::String("metric".to_string()));
}

fn canonicalize_email_draft(args: &mut Value) {
    let obj = args.as_object_mut().expect("ensured object above");
    obj.entry("to").or_insert_with(|| Value::String(String::new()));
    obj.entry("subject").or_insert_with(|| Value::String(String::new()));
    obj.entry("body").or_insert_with(|| Value::String(String::new()));
    obj.entry("importance").or_insert_with(|| Value::String("normal".to_string()));
}

/// `now + 30 minutes`, rounded down to the nearest 5-minute boundary.
fn next_rounded_slot() -> chrono::DateTime<Utc> {
    let candidate = Utc::now() + ChronoDuration::minutes(30);
    let minute = candidate.minute();
    let rounded_minute = (minute / 5) * 5;
    candidate
        .with_minute(rounded_minute)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(candidate)
}

fn drop_nulls(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        obj.retain(|_, v| !v.is_null());
    }
}

fn sort_keys(value: &mut Value) {
    if let Value::Object(obj) = value {
        let sorted: serde_json::Map<String, Value> = {
            let mut entries: Vec<_> = obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            entries.into_iter().collect()
        };
        *obj = sorted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_draft_gets_defaults_for_missing_fields() {
        let mut args = json!({});
        canonicalize_args("calendar.create_draft", &mut args, "planner-v2");

        assert_eq!(args["duration_min"], 30);
        assert_eq!(args["timezone"], "Europe/Stockholm");
        assert_eq!(args["attendees"], json!([]));
        assert!(args["start_iso"].is_string());
    }

    #[test]
    fn weather_lookup_defaults_unit_to_metric() {
        let mut args = json!({ "location": "Gothenburg" });
        canonicalize_args("weather.lookup", &mut args, "planner-v2");
        assert_eq!(args["unit"], "metric");
        assert_eq!(args["location"], "Gothenburg");
    }

    #[test]
    fn email_draft_defaults_are_all_empty_strings_except_importance() {
        let mut args = json!({});
        canonicalize_args("email.create_draft", &mut args, "planner-v2");
        assert_eq!(args["to"], "");
        assert_eq!(args["subject"], "");
        assert_eq!(args["body"], "");
        assert_eq!(args["importance"], "normal");
    }

    #[test]
    fn null_valued_entries_are_dropped() {
        let mut args = json!({ "location": null, "unit": "imperial" });
        canonicalize_args("weather.lookup", &mut args, "planner-v2");
        assert_eq!(args["location"], "Stockholm");
        assert_eq!(args["unit"], "imperial");
    }

    #[test]
    fn keys_end_up_sorted() {
        let mut args = json!({ "timezone": "Europe/Stockholm", "attendees": [] });
        canonicalize_args("calendar.create_draft", &mut args, "planner-v2");
        let keys: Vec<_> = args.as_object().unwrap().keys().cloned().collect();
        let mut sorted_keys = keys.clone();
        sorted_keys.sort();
        assert_eq!(keys, sorted_keys);
    }
}
