//! Instruction Parser - uses the LLM to convert a free-text update
//! instruction into a structured `UpdateIntent`.
//!
//! The LLM is prompted to output one JSON object with exactly three keys.
//! Extraction is defensive: the first balanced brace-delimited JSON object
//! is scanned out of the raw response; anything that fails to parse or is
//! missing required keys becomes a `Validation` failure carrying the raw
//! response for diagnostics. Nothing here retries.

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::llm::LlmClient;
use crate::types::UpdateIntent;

const PARSE_SYSTEM_PROMPT: &str = r#"You are an assistant that parses user instructions for updating ticket fields.

Given a natural language instruction like:
- "Set expected go-live date to 12-12-2026"
- "Add CFFC service, Phishing detection"
- "Remove Brand Abuse Mitigation from CFFC"
- "Change support mode to L1+L2"
- "Clear the project start date"

Your task is to extract:
1. `field_label` - name of the field being updated
2. `value` - the new value (can be a string, a list of strings, or null)
3. `action` - one of "replace", "add", or "remove"

Return ONLY a JSON object in this format:
{
  "field_label": "cffc services included",
  "value": ["Phishing detection"],
  "action": "add"
}

Rules:
- Use "add" if the instruction says things like "add", "include", "append", or "also".
- Use "remove" if it says "remove", "delete", "exclude".
- Use "replace" for set/change/update/modify.
- If the instruction is about clearing or emptying a field, set value to null and use "replace" as the action.
- Be strict about outputting valid JSON only. No markdown, no explanations."#;

/// Extract the first balanced brace-delimited JSON object from `text`.
///
/// The scan is string-aware: braces inside JSON string literals (including
/// escaped quotes) do not count toward nesting. Returns `None` when no
/// balanced object exists.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a free-text update instruction into a structured intent.
pub async fn parse_update(llm: &dyn LlmClient, text: &str) -> Result<UpdateIntent> {
    let raw = llm.complete(PARSE_SYSTEM_PROMPT, text).await?;
    debug!(raw = %raw, "instruction parser raw LLM response");
    parse_intent_response(&raw)
}

/// Deserialize the raw LLM response into an `UpdateIntent`.
pub(crate) fn parse_intent_response(raw: &str) -> Result<UpdateIntent> {
    let json_str = extract_json_object(raw).ok_or_else(|| {
        CoreError::validation_with_raw("no JSON object found in LLM response", raw)
    })?;

    let intent: UpdateIntent = serde_json::from_str(json_str).map_err(|e| {
        CoreError::validation_with_raw(format!("failed to parse update intent: {}", e), raw)
    })?;

    if intent.field_label.trim().is_empty() {
        return Err(CoreError::validation_with_raw(
            "update intent has an empty field_label",
            raw,
        ));
    }

    Ok(intent)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntentValue, UpdateAction};

    #[test]
    fn test_extract_clean_json() {
        let raw = r#"{"field_label": "support mode", "value": "L1+L2", "action": "replace"}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn test_extract_markdown_wrapped_json() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_text_wrapped_json() {
        let raw = "Here is the result:\n\n{\"a\": {\"b\": 2}}\n\nLet me know!";
        assert_eq!(extract_json_object(raw), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_extract_ignores_braces_inside_strings() {
        let raw = r#"{"note": "odd } brace", "n": 1}"#;
        assert_eq!(extract_json_object(raw), Some(raw));
    }

    #[test]
    fn test_extract_unbalanced_returns_none() {
        assert_eq!(extract_json_object("{\"a\": 1"), None);
        assert_eq!(extract_json_object("no json here"), None);
    }

    #[test]
    fn test_parse_add_intent_with_list_value() {
        let raw = r#"{"field_label": "cffc services included",
                      "value": ["Phishing detection"],
                      "action": "add"}"#;
        let intent = parse_intent_response(raw).expect("valid intent");
        assert_eq!(intent.field_label, "cffc services included");
        assert_eq!(intent.action, UpdateAction::Add);
        assert_eq!(intent.value.as_list(), vec!["Phishing detection"]);
    }

    #[test]
    fn test_parse_clear_intent_is_null_replace() {
        let raw = r#"{"field_label": "project start date", "value": null, "action": "replace"}"#;
        let intent = parse_intent_response(raw).expect("valid intent");
        assert!(intent.value.is_null());
        assert_eq!(intent.action, UpdateAction::Replace);
    }

    #[test]
    fn test_parse_missing_key_fails_with_raw_attached() {
        let raw = r#"{"field_label": "support mode", "value": "L1"}"#;
        let err = parse_intent_response(raw).expect_err("missing action");
        match err {
            CoreError::Validation { raw: Some(r), .. } => assert!(r.contains("support mode")),
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_non_json_fails_with_raw_attached() {
        let raw = "I'm sorry, I cannot help with that.";
        let err = parse_intent_response(raw).expect_err("no JSON");
        match err {
            CoreError::Validation { raw: Some(r), .. } => assert_eq!(r, raw),
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_action_fails() {
        let raw = r#"{"field_label": "support mode", "value": "L1", "action": "toggle"}"#;
        assert!(parse_intent_response(raw).is_err());
    }

    #[test]
    fn test_intent_value_scalar_round_trip() {
        let raw = r#"{"field_label": "support mode", "value": "L1+L2", "action": "replace"}"#;
        let intent = parse_intent_response(raw).expect("valid intent");
        assert_eq!(intent.value, IntentValue::One("L1+L2".to_string()));
    }
}
