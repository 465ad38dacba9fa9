//! Domain models for the analysis pipeline.

mod analysis;
mod file_group;
mod metadata;
mod video;

pub use analysis::{AnalysisResult, Bite, ImportanceScore, Keyword, MentionedLocation, RelatedNews};
pub use file_group::FileGroup;
pub use metadata::{DurationValue, ParsedMetadata};
pub use video::{AnalysisStatus, VideoRecord};

use serde_json::{Map, Value};

/// Read an optional text field from a decoded AI response object.
///
/// Strings are trimmed and blank strings count as absent. Numbers and
/// booleans are stringified; arrays and objects are a schema violation.
pub(crate) fn text_field(object: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(format!(
            "field `{}` must be a string, got {}",
            key,
            json_type_name(other)
        )),
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
