//! Lexical repair: pure string surgery on a raw model response, attempted
//! once, before any JSON parsing happens.

/// Trims trailing prose after the last `}` and rebalances braces/quotes when
/// the response is off by exactly one. This recovers the common case of a
/// model appending a trailing sentence after well-formed JSON, or dropping
/// the final closing brace.
pub fn lexical_repair(raw: &str) -> String {
    let trimmed = trim_to_last_brace(raw.trim());
    rebalance(&trimmed)
}

fn trim_to_last_brace(text: &str) -> String {
    match text.rfind('}') {
        Some(index) => text[..=index].to_string(),
        None => text.to_string(),
    }
}

fn rebalance(text: &str) -> String {
    let opens = text.matches('{').count();
    let closes = text.matches('}').count();
    let mut repaired = text.to_string();

    if opens == closes + 1 {
        repaired.push('}');
    }

    let quotes = repaired.chars().filter(|&c| c == '"').count();
    if quotes % 2 == 1 {
        // An odd quote count off by one is most often a missing closing
        // quote right before the final brace.
        if let Some(index) = repaired.rfind('}') {
            repaired.insert(index, '"');
        }
    }

    repaired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_trailing_prose_after_the_json_object() {
        let raw = r#"{"a":1} hope that helps!"#;
        assert_eq!(lexical_repair(raw), r#"{"a":1}"#);
    }

    #[test]
    fn adds_a_single_missing_closing_brace() {
        let raw = r#"{"a":1"#;
        assert_eq!(lexical_repair(raw), r#"{"a":1}"#);
    }

    #[test]
    fn leaves_a_well_formed_object_untouched() {
        let raw = r#"{"a":1,"b":"two"}"#;
        assert_eq!(lexical_repair(raw), raw);
    }
}
