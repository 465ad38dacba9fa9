//! Recovery of strict JSON from free-form model output.
//!
//! Models wrap JSON in markdown fences, prefix it with chatter, or leave
//! raw control characters and line breaks inside strings. The sanitizer
//! undoes those, validates the result, and returns it in canonical compact
//! form so that cleaning twice yields the same text.

use serde_json::Value;
use thiserror::Error;

/// No valid JSON could be recovered.
#[derive(Debug, Clone, Error)]
#[error("no valid JSON could be recovered: {reason}")]
pub struct FormatError {
    pub reason: String,
    /// The unmodified input, kept for diagnostics.
    pub raw: String,
}

pub struct ResponseSanitizer;

impl ResponseSanitizer {
    /// Clean raw bytes, replacing invalid UTF-8 with U+FFFD first.
    pub fn clean_bytes(raw: &[u8]) -> Result<String, FormatError> {
        Self::clean(&String::from_utf8_lossy(raw))
    }

    /// Clean model output into canonical JSON text.
    ///
    /// Schema conformance is not checked; callers validate the shape.
    pub fn clean(raw: &str) -> Result<String, FormatError> {
        let text = raw.trim().trim_start_matches('\u{feff}').trim();
        let text = strip_fences(text);
        let span = outermost_span(text).unwrap_or(text);
        let stripped: String = span.chars().filter(|c| !is_breaking_control(*c)).collect();

        let value = match serde_json::from_str::<Value>(&stripped) {
            Ok(value) => value,
            Err(first_err) => serde_json::from_str::<Value>(&collapse_whitespace(&stripped))
                .map_err(|_| FormatError {
                    reason: first_err.to_string(),
                    raw: raw.to_string(),
                })?,
        };

        serde_json::to_string(&value).map_err(|e| FormatError {
            reason: e.to_string(),
            raw: raw.to_string(),
        })
    }

    /// Clean and decode in one step.
    pub fn parse(raw: &str) -> Result<Value, FormatError> {
        let cleaned = Self::clean(raw)?;
        serde_json::from_str(&cleaned).map_err(|e| FormatError {
            reason: e.to_string(),
            raw: raw.to_string(),
        })
    }
}

fn strip_fences(text: &str) -> &str {
    let mut text = text;
    if let Some(rest) = text.strip_prefix("```") {
        text = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Outermost `{...}` or `[...]` span, whichever opens first.
///
/// Brackets inside string literals are ignored. If the opener is never
/// closed, falls back to the last matching closer, or the rest of the text.
fn outermost_span(text: &str) -> Option<&str> {
    let start = match (text.find('{'), text.find('[')) {
        (Some(brace), Some(bracket)) => brace.min(bracket),
        (Some(brace), None) => brace,
        (None, Some(bracket)) => bracket,
        (None, None) => return None,
    };
    let close = if text.as_bytes()[start] == b'{' { '}' } else { ']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    Some(match text.rfind(close) {
        Some(end) if end > start => &text[start..=end],
        _ => &text[start..],
    })
}

/// C0 controls other than tab/LF/CR.
///
/// DEL is kept: serde_json writes it back out raw, so removing it here
/// would change the text on a second pass.
fn is_breaking_control(c: char) -> bool {
    matches!(c as u32, 0..=8 | 11 | 12 | 14..=31)
}

/// Line breaks and tabs become spaces; runs of spaces collapse to one.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        let c = if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c };
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        assert_eq!(
            ResponseSanitizer::clean(r#"{ "a": 1, "b": [true, null] }"#).unwrap(),
            r#"{"a":1,"b":[true,null]}"#
        );
    }

    #[test]
    fn test_strips_fences() {
        let raw = "```json\n{\"title\": \"Flood\"}\n```";
        assert_eq!(ResponseSanitizer::clean(raw).unwrap(), r#"{"title":"Flood"}"#);

        let raw = "```\n[1, 2]\n```";
        assert_eq!(ResponseSanitizer::clean(raw).unwrap(), "[1,2]");
    }

    #[test]
    fn test_extracts_span_from_chatter() {
        let raw = "Sure! Here is the result:\n{\"location\": \"東京\"}\nLet me know if you need more.";
        assert_eq!(
            ResponseSanitizer::clean(raw).unwrap(),
            r#"{"location":"東京"}"#
        );
    }

    #[test]
    fn test_prefers_earliest_opener() {
        let raw = "[{\"a\": 1}, {\"b\": 2}] trailing {\"c\": 3}";
        assert_eq!(
            ResponseSanitizer::clean(raw).unwrap(),
            r#"[{"a":1},{"b":2}]"#
        );

        let raw = "note {\"list\": [1, 2]} and [3]";
        assert_eq!(ResponseSanitizer::clean(raw).unwrap(), r#"{"list":[1,2]}"#);
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        let raw = r#"prefix {"quote": "he said } and ]", "n": 1} suffix"#;
        assert_eq!(
            ResponseSanitizer::clean(raw).unwrap(),
            r#"{"n":1,"quote":"he said } and ]"}"#
        );
    }

    #[test]
    fn test_removes_control_characters() {
        let raw = "\u{feff}{\"a\": \"x\u{0001}y\u{007f}\"}";
        assert_eq!(ResponseSanitizer::clean(raw).unwrap(), "{\"a\":\"xy\u{7f}\"}");
    }

    #[test]
    fn test_collapses_raw_newlines_in_strings() {
        let raw = "{\"shotlist\": \"1. Wide\n2.\tClose\"}";
        assert_eq!(
            ResponseSanitizer::clean(raw).unwrap(),
            r#"{"shotlist":"1. Wide 2. Close"}"#
        );
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let raw = b"{\"a\": \"ok\xff\"}";
        assert_eq!(
            ResponseSanitizer::clean_bytes(raw).unwrap(),
            "{\"a\":\"ok\u{fffd}\"}"
        );
    }

    #[test]
    fn test_unrecoverable_is_format_error() {
        let raw = "Sure! Here's the JSON: {bad json";
        let err = ResponseSanitizer::clean(raw).unwrap_err();
        assert_eq!(err.raw, raw);

        assert!(ResponseSanitizer::clean("").is_err());
        assert!(ResponseSanitizer::clean("no json here").is_err());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let inputs = [
            "```json\n{\"b\": 2, \"a\": [1, 2.5, \"x\\ny\"]}\n```",
            "Here: [{\"k\": \"東京\"}] done",
            "{\"a\": \"line\nbreak\"}",
            "{\"e\": \"\\u0001 escaped\", \"big\": 12345678901234}",
            r#"{"a": "x\u007fy"}"#,
        ];
        for input in inputs {
            let once = ResponseSanitizer::clean(input).unwrap();
            let twice = ResponseSanitizer::clean(&once).unwrap();
            assert_eq!(once, twice, "input: {input:?}");
        }
    }
}
