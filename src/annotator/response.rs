//! Model reply parsing

use serde_json::Value;

use super::AnnotateError;
use crate::models::FieldValue;

const FENCE: &str = "```";

/// One per-process verdict as returned by the model.
/// Every field is optional; the annotator fills gaps with defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub pid: Option<FieldValue>,
    pub description: Option<String>,
    pub suspicious: Option<bool>,
    pub reason: Option<String>,
}

impl AnalysisResult {
    /// `None` for anything that is not a JSON object
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let pid = obj.get("pid").and_then(|v| match v {
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Text(n.to_string()),
            }),
            Value::String(s) => Some(FieldValue::from(s.as_str())),
            _ => None,
        });

        Some(Self {
            pid,
            description: obj.get("description").and_then(Value::as_str).map(str::to_string),
            suspicious: obj.get("suspicious").and_then(Value::as_bool),
            reason: obj.get("reason").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// Strip a markdown code fence around a model reply.
///
/// Handles a leading fence with an optional language tag (```` ```json ````)
/// and a trailing fence, each independently. Text without fences comes
/// back trimmed.
pub fn unwrap_code_fence(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix(FENCE) {
        // language tag runs up to the first whitespace
        let tag_len = rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(rest.len());
        let tag = &rest[..tag_len];
        body = if tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            &rest[tag_len..]
        } else {
            rest
        };
    }

    let body = body.trim();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Parse a model reply into verdicts.
///
/// A bare object is treated as a one-element array. Array items that are
/// not objects are skipped, but a non-empty array with no objects at all
/// is an error.
pub fn parse_analysis_results(text: &str) -> Result<Vec<AnalysisResult>, AnnotateError> {
    let cleaned = unwrap_code_fence(text);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| AnnotateError::Parse(e.to_string()))?;

    match value {
        Value::Array(items) => {
            let results: Vec<AnalysisResult> =
                items.iter().filter_map(AnalysisResult::from_value).collect();
            if results.is_empty() && !items.is_empty() {
                return Err(AnnotateError::Parse(
                    "expected a JSON array of objects, got no objects".to_string(),
                ));
            }
            Ok(results)
        }
        obj @ Value::Object(_) => Ok(AnalysisResult::from_value(&obj).into_iter().collect()),
        other => Err(AnnotateError::Parse(format!(
            "expected a JSON array of objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
