//! Metadata extracted from a sidecar text file.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::{json_type_name, text_field, VideoRecord};

/// Duration as returned by the text model.
///
/// Models send durations as a JSON number, a numeric string, or not at all.
/// Decoding tries each representation in order instead of coercing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DurationValue {
    Integer(i64),
    Text(String),
    #[default]
    Absent,
}

type DurationAttempt = fn(&Value) -> Option<DurationValue>;

impl DurationValue {
    const ATTEMPTS: [DurationAttempt; 2] = [Self::from_number, Self::from_text];

    pub fn decode(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::Absent;
        };
        Self::ATTEMPTS
            .iter()
            .find_map(|attempt| attempt(value))
            .unwrap_or(Self::Absent)
    }

    fn from_number(value: &Value) -> Option<Self> {
        let Value::Number(n) = value else {
            return None;
        };
        if let Some(i) = n.as_i64() {
            return Some(Self::Integer(i));
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(Self::Integer(f as i64))
            }
            _ => Some(Self::Text(n.to_string())),
        }
    }

    fn from_text(value: &Value) -> Option<Self> {
        let s = value.as_str()?.trim();
        Some(match s.parse::<i64>() {
            Ok(n) => Self::Integer(n),
            Err(_) => Self::Text(s.to_string()),
        })
    }

    /// Resolve against the previously stored duration.
    ///
    /// Only a positive integer replaces the prior value.
    pub fn resolve(&self, previous: Option<i64>) -> Option<i64> {
        match self {
            Self::Integer(n) if *n > 0 => Some(*n),
            _ => previous,
        }
    }
}

/// Structured metadata parsed from the text model's JSON answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub title: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS` as returned by the model.
    pub creation_date: Option<String>,
    pub duration: DurationValue,
    pub subjects: Vec<String>,
    pub location: Option<String>,
    pub shotlist_content: Option<String>,
    pub restrictions: Option<String>,
    pub translated_restrictions: Option<String>,
}

impl ParsedMetadata {
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let object = value.as_object().ok_or_else(|| {
            format!(
                "expected a JSON object, got {}",
                json_type_name(value)
            )
        })?;

        Ok(Self {
            title: text_field(object, "title")?,
            creation_date: text_field(object, "creation_date")?,
            duration: DurationValue::decode(object.get("duration_seconds")),
            subjects: decode_subjects(object.get("subjects"))?,
            location: text_field(object, "location")?,
            shotlist_content: text_field(object, "shotlist_content")?,
            restrictions: text_field(object, "restrictions")?,
            translated_restrictions: text_field(object, "translated_restrictions")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse `creation_date`, accepting a bare date as midnight UTC.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.creation_date.as_deref()?;
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(dt.and_utc());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Merge into a stored record. Absent fields keep the stored value.
    pub fn merge_into(&self, record: &mut VideoRecord) {
        fn keep_or_replace(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        keep_or_replace(&mut record.title, &self.title);
        keep_or_replace(&mut record.location, &self.location);
        keep_or_replace(&mut record.shotlist_content, &self.shotlist_content);
        keep_or_replace(&mut record.restrictions, &self.restrictions);
        keep_or_replace(
            &mut record.translated_restrictions,
            &self.translated_restrictions,
        );

        match (self.creation_date.as_deref(), self.published_at()) {
            (_, Some(published)) => record.published_at = Some(published),
            (Some(raw), None) => {
                tracing::warn!(
                    "Unparseable creation_date '{}' for {}, keeping previous value",
                    raw,
                    record.nas_path
                );
            }
            (None, None) => {}
        }

        record.duration_secs = self.duration.resolve(record.duration_secs);

        if !self.subjects.is_empty() {
            record.subjects = self.subjects.clone();
        }
    }
}

fn decode_subjects(value: Option<&Value>) -> Result<Vec<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.trim().to_string()]),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect()),
        Some(other) => Err(format!(
            "field `subjects` must be an array of strings, got {}",
            json_type_name(other)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_duration_decode_order() {
        assert_eq!(
            DurationValue::decode(Some(&json!(125))),
            DurationValue::Integer(125)
        );
        assert_eq!(
            DurationValue::decode(Some(&json!("125"))),
            DurationValue::Integer(125)
        );
        assert_eq!(
            DurationValue::decode(Some(&json!(" 125 "))),
            DurationValue::Integer(125)
        );
        assert_eq!(
            DurationValue::decode(Some(&json!(90.0))),
            DurationValue::Integer(90)
        );
        assert_eq!(
            DurationValue::decode(Some(&json!("about a minute"))),
            DurationValue::Text("about a minute".to_string())
        );
        assert_eq!(DurationValue::decode(Some(&Value::Null)), DurationValue::Absent);
        assert_eq!(DurationValue::decode(None), DurationValue::Absent);
        assert_eq!(DurationValue::decode(Some(&json!([1]))), DurationValue::Absent);
    }

    #[test]
    fn test_duration_resolution_keeps_prior_value() {
        let prior = Some(42);
        assert_eq!(DurationValue::Integer(125).resolve(prior), Some(125));
        assert_eq!(
            DurationValue::decode(Some(&json!("125"))).resolve(prior),
            Some(125)
        );
        assert_eq!(
            DurationValue::decode(Some(&Value::Null)).resolve(prior),
            prior
        );
        assert_eq!(DurationValue::Integer(0).resolve(prior), prior);
        assert_eq!(DurationValue::Text("n/a".into()).resolve(None), None);
    }

    #[test]
    fn test_parse_full_object() {
        let value = json!({
            "title": "Flooding in Osaka",
            "creation_date": "2024-06-01 08:30:00",
            "duration_seconds": "90",
            "subjects": ["weather", "japan"],
            "location": "東京",
            "shotlist_content": "1. Wide shot",
            "restrictions": "No access Japan",
            "translated_restrictions": "日本不可使用",
            "unknown_key": true
        });

        let parsed = ParsedMetadata::from_json(&value).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Flooding in Osaka"));
        assert_eq!(parsed.duration, DurationValue::Integer(90));
        assert_eq!(parsed.subjects, vec!["weather", "japan"]);
        assert_eq!(parsed.location.as_deref(), Some("東京"));
        assert_eq!(
            parsed.published_at(),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(ParsedMetadata::from_json(&json!([1, 2])).is_err());
        assert!(ParsedMetadata::from_json(&json!({"title": {"nested": 1}})).is_err());
        assert!(ParsedMetadata::from_json(&json!({"subjects": 3})).is_err());
    }

    #[test]
    fn test_subjects_single_string() {
        let parsed = ParsedMetadata::from_json(&json!({"subjects": "politics"})).unwrap();
        assert_eq!(parsed.subjects, vec!["politics"]);
    }

    #[test]
    fn test_empty_object_is_empty_metadata() {
        let parsed = ParsedMetadata::from_json(&json!({})).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_bare_date_accepted() {
        let parsed = ParsedMetadata {
            creation_date: Some("2024-06-01".to_string()),
            ..Default::default()
        };
        assert_eq!(
            parsed.published_at(),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_merge_keeps_stored_fields() {
        let mut record = VideoRecord {
            id: Some(1),
            source_name: "ap".into(),
            source_id: "1".into(),
            nas_path: "ap/1/a.mp4".into(),
            title: Some("Old title".into()),
            discovered_at: Utc::now(),
            published_at: None,
            duration_secs: Some(30),
            shotlist_content: None,
            view_link: Some("https://example.com/v/1".into()),
            subjects: vec!["old".into()],
            location: None,
            restrictions: None,
            translated_restrictions: None,
            source_metadata: None,
            analysis_status: crate::models::AnalysisStatus::MetadataExtracting,
            analyzed_at: None,
            prompt_version: None,
            last_error: None,
        };

        let parsed = ParsedMetadata {
            location: Some("東京".into()),
            creation_date: Some("not a date".into()),
            ..Default::default()
        };
        parsed.merge_into(&mut record);

        assert_eq!(record.title.as_deref(), Some("Old title"));
        assert_eq!(record.location.as_deref(), Some("東京"));
        assert_eq!(record.duration_secs, Some(30));
        assert_eq!(record.subjects, vec!["old"]);
        assert_eq!(record.view_link.as_deref(), Some("https://example.com/v/1"));
        assert_eq!(record.published_at, None);
    }
}
