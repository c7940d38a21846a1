//! Model output parsing and validation
//!
//! The model response is untrusted text. Every field of every operation is
//! coerced on its own: a field of the wrong type is dropped, never the whole
//! operation.

use serde_json::Value;
use tracing::{debug, warn};

use super::error::OperationParseError;
use super::markdown::{dedupe_case_insensitive, normalize_page_key};
use super::types::ParsedOperation;

/// Confidence assumed when the model omits one
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Parse raw model text into validated, sorted, truncated operations
pub fn parse_operations(raw: &str, max_operations: usize) -> Result<Vec<ParsedOperation>, OperationParseError> {
    debug!(raw_len = raw.len(), %max_operations, "parse_operations: called");
    let payload = extract_json_payload(raw).ok_or(OperationParseError::PayloadNotFound)?;
    let value: Value = serde_json::from_str(payload)?;

    let entries = value
        .get("operations")
        .and_then(Value::as_array)
        .ok_or(OperationParseError::MissingOperations)?;

    let mut operations: Vec<ParsedOperation> = entries.iter().filter_map(coerce_operation).collect();
    debug!(
        entry_count = entries.len(),
        valid_count = operations.len(),
        "parse_operations: coerced entries"
    );

    operations.sort_by(|a, b| {
        (&a.page_key, &a.title, &a.summary, &a.content).cmp(&(&b.page_key, &b.title, &b.summary, &b.content))
    });
    operations.truncate(max_operations);
    Ok(operations)
}

/// Locate the JSON object in the model text
///
/// A fenced ```json block wins when present; the object is the span from the
/// first `{` to the last `}` of that block (or of the raw text).
pub fn extract_json_payload(raw: &str) -> Option<&str> {
    let scope = match raw.find("```json") {
        Some(start) => {
            let after = &raw[start + "```json".len()..];
            let end = after.find("```").unwrap_or(after.len());
            &after[..end]
        }
        None => raw,
    };

    let start = scope.find('{')?;
    let end = scope.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&scope[start..=end])
}

fn coerce_operation(entry: &Value) -> Option<ParsedOperation> {
    let obj = entry.as_object()?;

    let title = string_field(obj.get("title"));
    let mut page_key = string_field(obj.get("pageKey"));
    if page_key.is_empty() {
        page_key = normalize_page_key(&title);
    }
    if page_key.is_empty() {
        if title.is_empty() {
            debug!("coerce_operation: entry has neither pageKey nor title, skipping");
        } else {
            warn!(%title, "coerce_operation: title yields no page key, skipping");
        }
        return None;
    }

    Some(ParsedOperation {
        page_key,
        title,
        summary: string_field(obj.get("summary")),
        keywords: list_field(obj.get("keywords")),
        aliases: list_field(obj.get("aliases")),
        content: string_field(obj.get("content")),
        confidence: confidence_field(obj.get("confidence")),
        rationale: string_field(obj.get("rationale")),
    })
}

fn string_field(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).map(|s| s.trim().to_string()).unwrap_or_default()
}

fn list_field(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    dedupe_case_insensitive(items)
}

fn confidence_field(value: Option<&Value>) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}
