//! Model Output Validation
//!
//! Models occasionally wrap JSON in markdown fences or prose. The extractor
//! peels those layers before parsing; a response that still fails to parse
//! is a schema violation and is not retried.

use serde_json::Value;

use crate::types::{PressError, Result};

/// Extract and parse the JSON object from a raw model response
pub fn extract_json_from_response(content: &str) -> Result<Value> {
    let cleaned = preprocess(content);
    serde_json::from_str::<Value>(&cleaned).map_err(|e| {
        PressError::GenerationFailed(format!("model output is not valid JSON: {}", e))
    })
}

/// Strip markdown fences and any prose around the outermost JSON object
fn preprocess(raw: &str) -> String {
    let trimmed = raw.trim();

    // ```json ... ``` or ``` ... ```
    if let Some(stripped) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        && let Some(inner) = stripped.strip_suffix("```")
    {
        return inner.trim().to_string();
    }

    // Prose before/after a single object: cut to the outermost braces
    if !trimmed.starts_with('{')
        && let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Check that every named field is present and non-null on the object
pub fn require_fields(value: &Value, fields: &[&str]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|f| value.get(**f).map(Value::is_null).unwrap_or(true))
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PressError::GenerationFailed(format!(
            "model output missing required fields: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let value = extract_json_from_response(r#"{"title": "x"}"#).unwrap();
        assert_eq!(value["title"], "x");
    }

    #[test]
    fn test_fenced_json() {
        let value = extract_json_from_response("```json\n{\"title\": \"x\"}\n```").unwrap();
        assert_eq!(value["title"], "x");
    }

    #[test]
    fn test_prose_wrapped_json() {
        let value =
            extract_json_from_response("Here is the result:\n{\"title\": \"x\"}\nDone.").unwrap();
        assert_eq!(value["title"], "x");
    }

    #[test]
    fn test_garbage_rejected() {
        let err = extract_json_from_response("no json here").unwrap_err();
        assert!(matches!(err, PressError::GenerationFailed(_)));
    }

    #[test]
    fn test_require_fields() {
        let value: Value = serde_json::from_str(r#"{"a": 1, "b": null}"#).unwrap();
        assert!(require_fields(&value, &["a"]).is_ok());
        assert!(require_fields(&value, &["a", "b"]).is_err());
        assert!(require_fields(&value, &["c"]).is_err());
    }
}
