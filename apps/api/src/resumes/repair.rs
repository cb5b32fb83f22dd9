//! Response repair: recovers a JSON object from free-form model output.
//!
//! 1. Greedy span: first `{` through last `}`.
//! 2. Normalize: every `'` becomes `"`; trailing commas before `}` / `]` are dropped.
//! 3. Strict `serde_json` decode; the result must be a non-empty object.
//!
//! The quote rewrite is a blind global replace. An apostrophe inside a value
//! (`"O'Brien"`) breaks the JSON and the reply is treated as malformed.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("No JSON object found in response")]
    NoJsonFound,

    #[error("Malformed JSON: {0}")]
    MalformedJson(String),

    #[error("Response held an empty JSON object")]
    EmptyObject,
}

fn trailing_comma() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([\]}])").expect("trailing-comma pattern is valid"))
}

/// The greedy `{ ... }` span, or `None` when there is no opening brace
/// followed somewhere by a closing one.
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Applies the quote and trailing-comma repairs to a candidate span.
pub fn normalize(span: &str) -> String {
    let quoted = span.replace('\'', "\"");
    trailing_comma().replace_all(&quoted, "$1").into_owned()
}

/// Extracts and decodes the JSON object embedded in `text`.
pub fn repair_json(text: &str) -> Result<Map<String, Value>, RepairError> {
    let span = json_span(text).ok_or(RepairError::NoJsonFound)?;
    let normalized = normalize(span);

    match serde_json::from_str::<Value>(&normalized) {
        Ok(Value::Object(fields)) if fields.is_empty() => Err(RepairError::EmptyObject),
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(RepairError::MalformedJson(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(RepairError::MalformedJson(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLEAN: &str = r#"{"Name": "Jane Doe", "Email": "jane@example.com", "Phone": "+91 98765 43210", "Location": "Pune, India", "Years of Experience": "7"}"#;

    #[test]
    fn test_clean_object_decodes() {
        let fields = repair_json(CLEAN).unwrap();
        assert_eq!(fields["Name"], "Jane Doe");
        assert_eq!(fields["Years of Experience"], "7");
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn test_surrounding_commentary_is_ignored() {
        let wrapped = [
            format!("Here is the extracted data:\n{CLEAN}\nLet me know if you need anything else."),
            format!("```json\n{CLEAN}\n```"),
            format!("Sure!   {CLEAN}"),
            format!("{CLEAN}   -- end"),
        ];
        let expected = repair_json(CLEAN).unwrap();
        for text in &wrapped {
            assert_eq!(repair_json(text).unwrap(), expected, "input: {text}");
        }
    }

    #[test]
    fn test_span_runs_from_first_open_to_last_close() {
        let text = "prefix {\"a\": {\"b\": \"c\"}} suffix";
        assert_eq!(json_span(text), Some("{\"a\": {\"b\": \"c\"}}"));
    }

    #[test]
    fn test_greedy_span_swallows_two_objects_and_fails() {
        // Two separate objects produce a span that is not one valid object.
        let text = r#"{"Name": "A"} and also {"Name": "B"}"#;
        assert_eq!(json_span(text), Some(text));
        assert!(matches!(
            repair_json(text),
            Err(RepairError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_missing_braces_is_no_json_found() {
        for text in [
            "",
            "I could not find any details in this resume.",
            "only an opening { brace",
            "only a closing } brace",
            "} reversed {",
        ] {
            assert!(
                matches!(repair_json(text), Err(RepairError::NoJsonFound)),
                "input: {text:?}"
            );
        }
    }

    #[test]
    fn test_single_quotes_are_normalized() {
        let fields = repair_json("{'Name': 'Jane Doe', 'Email': 'jane@example.com'}").unwrap();
        assert_eq!(fields["Name"], "Jane Doe");
        assert_eq!(fields["Email"], "jane@example.com");
    }

    #[test]
    fn test_trailing_commas_are_stripped() {
        let fields = repair_json(r#"{"a":"1","b":"2",}"#).unwrap();
        assert_eq!(Value::Object(fields), json!({"a": "1", "b": "2"}));

        let nested = repair_json("{\"skills\": [\"Rust\", \"SQL\",\n ],\n}").unwrap();
        assert_eq!(nested["skills"], json!(["Rust", "SQL"]));
    }

    #[test]
    fn test_apostrophe_in_value_corrupts_the_object() {
        // Known limitation of the global quote rewrite.
        let text = r#"{"Name": "O'Brien", "Email": "ob@example.com"}"#;
        assert_eq!(
            normalize(text),
            r#"{"Name": "O"Brien", "Email": "ob@example.com"}"#
        );
        assert!(matches!(
            repair_json(text),
            Err(RepairError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_truncated_object_is_malformed() {
        let text = r#"{"Name": "Jane", "Email": }"#;
        assert!(matches!(
            repair_json(text),
            Err(RepairError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_repair_is_idempotent_on_its_own_output() {
        let first = repair_json(&format!("Result: {CLEAN}")).unwrap();
        let serialized = serde_json::to_string(&first).unwrap();
        let second = repair_json(&serialized).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_object_is_rejected() {
        for text in ["{}", "Here you go: { }", "{,}"] {
            assert!(
                matches!(repair_json(text), Err(RepairError::EmptyObject)),
                "input: {text:?}"
            );
        }
    }

    #[test]
    fn test_key_order_is_preserved() {
        let fields = repair_json(r#"{"Phone": "1", "Name": "2", "Email": "3"}"#).unwrap();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Phone", "Name", "Email"]);
    }

    #[test]
    fn test_non_string_values_survive() {
        let fields = repair_json(r#"{"Name": "Jane", "Years of Experience": 7.5, "Phone": null}"#)
            .unwrap();
        assert_eq!(fields["Years of Experience"], json!(7.5));
        assert!(fields["Phone"].is_null());
    }
}
