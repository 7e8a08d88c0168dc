use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Explanation attached when no structured payload is found and the raw
/// model text is carried as SQL.
const RAW_FALLBACK_EXPLANATION: &str = "Raw LLM output (no JSON detected)";

/// Structured record recovered from free-form model text. Every field has
/// a defined default, so extraction is total.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedResponse {
    pub sql: String,
    pub explanation: String,
    pub warnings: Vec<String>,
    pub row_limit_applied: bool,
    pub suggested_visualization: String,
}

fn fenced_json_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"(?is)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced block pattern")
    })
}

/// Recovers a structured response from model output. Three stages, first
/// match wins: a fenced JSON object, the whole text as a JSON object, then
/// the raw text treated as SQL. Never fails; malformed payloads degrade to
/// the next stage.
pub fn extract(text: &str) -> ExtractedResponse {
    if let Some(captures) = fenced_json_block().captures(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
            if value.is_object() {
                return from_value(&value);
            }
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return from_value(&value);
        }
    }

    ExtractedResponse {
        sql: text.to_string(),
        explanation: RAW_FALLBACK_EXPLANATION.to_string(),
        warnings: Vec::new(),
        row_limit_applied: false,
        suggested_visualization: "table".to_string(),
    }
}

fn from_value(value: &Value) -> ExtractedResponse {
    ExtractedResponse {
        sql: value
            .get("sql")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        explanation: value
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        warnings: normalize_warnings(value.get("warnings")),
        row_limit_applied: value
            .get("row_limit_applied")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        suggested_visualization: value
            .get("suggested_visualization")
            .and_then(Value::as_str)
            .unwrap_or("table")
            .to_string(),
    }
}

/// Accepts a list of strings or a single string promoted to a one-element
/// list. Anything else, including a list with a non-string element, yields
/// an empty list rather than an error.
fn normalize_warnings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .unwrap_or_default(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}
