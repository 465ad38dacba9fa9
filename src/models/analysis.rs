//! Video analysis result models.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{json_type_name, text_field};

/// Output of the multimodal analysis stage, one per video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub video_id: i64,
    pub transcript: Option<String>,
    pub translation: Option<String>,
    pub short_summary: Option<String>,
    pub bulleted_summary: Option<String>,
    pub visual_description: Option<String>,
    pub material_type: Option<String>,
    pub bites: Option<Value>,
    pub mentioned_locations: Option<Value>,
    pub importance_score: Option<Value>,
    pub related_news: Option<Value>,
    pub topics: Option<Value>,
    pub keywords: Option<Value>,
    /// Set when the analysis attempt failed.
    pub error_message: Option<String>,
    pub prompt_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// A result recording only a failed attempt.
    pub fn failed(video_id: i64, message: impl Into<String>, prompt_version: Option<String>) -> Self {
        Self {
            video_id,
            error_message: Some(message.into()),
            prompt_version,
            ..Default::default()
        }
    }

    /// Decode the video model's JSON answer.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let object = value.as_object().ok_or_else(|| {
            format!("expected a JSON object, got {}", json_type_name(value))
        })?;

        // Semi-structured fields are stored verbatim and parsed on demand.
        let structured = |key: &str| match object.get(key) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        };

        let bulleted_summary = match object.get("bulleted_summary") {
            Some(Value::Array(items)) => {
                let lines: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.trim().to_string()),
                        other => Err(format!(
                            "field `bulleted_summary` items must be strings, got {}",
                            json_type_name(other)
                        )),
                    })
                    .collect::<Result<_, _>>()?;
                let joined = lines.join("\n");
                (!joined.trim().is_empty()).then_some(joined)
            }
            _ => text_field(object, "bulleted_summary")?,
        };

        Ok(Self {
            transcript: text_field(object, "transcript")?,
            translation: text_field(object, "translation")?,
            short_summary: text_field(object, "short_summary")?,
            bulleted_summary,
            visual_description: text_field(object, "visual_description")?,
            material_type: text_field(object, "material_type")?,
            bites: structured("bites"),
            mentioned_locations: structured("mentioned_locations"),
            importance_score: structured("importance_score"),
            related_news: structured("related_news"),
            topics: structured("topics"),
            keywords: structured("keywords"),
            error_message: text_field(object, "error_message")?,
            ..Default::default()
        })
    }

    pub fn is_failed(&self) -> bool {
        self.error_message.is_some()
    }

    /// Whether any narrative field carries content.
    pub fn has_narrative(&self) -> bool {
        [
            &self.transcript,
            &self.translation,
            &self.short_summary,
            &self.bulleted_summary,
            &self.visual_description,
            &self.material_type,
        ]
        .iter()
        .any(|field| field.is_some())
    }

    pub fn bites(&self) -> Result<Vec<Bite>, serde_json::Error> {
        decode_list(&self.bites)
    }

    pub fn mentioned_locations(&self) -> Result<Vec<MentionedLocation>, serde_json::Error> {
        decode_list(&self.mentioned_locations)
    }

    pub fn related_news(&self) -> Result<Vec<RelatedNews>, serde_json::Error> {
        decode_list(&self.related_news)
    }

    pub fn topics(&self) -> Result<Vec<String>, serde_json::Error> {
        decode_list(&self.topics)
    }

    pub fn keywords(&self) -> Result<Vec<Keyword>, serde_json::Error> {
        decode_list(&self.keywords)
    }

    pub fn importance_score(&self) -> Result<Option<ImportanceScore>, serde_json::Error> {
        self.importance_score
            .clone()
            .map(serde_json::from_value)
            .transpose()
    }
}

fn decode_list<T: DeserializeOwned>(value: &Option<Value>) -> Result<Vec<T>, serde_json::Error> {
    match value {
        None => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone()),
    }
}

/// A quotable soundbite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bite {
    #[serde(default)]
    pub speaker: Option<String>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub timecode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionedLocation {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportanceScore {
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedNews {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Ratings arrive as `8`, `8.5`, `"8"` or `"8/10"`.
fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s
            .split('/')
            .next()
            .and_then(|head| head.trim().parse::<f64>().ok()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "transcript": "Officials said the river rose overnight.",
            "translation": "官員表示河水在夜間上漲。",
            "short_summary": "Floods hit the city.",
            "bulleted_summary": ["River rose", "Roads closed"],
            "visual_description": "Aerial footage of flooded streets.",
            "material_type": "raw footage",
            "bites": [{"speaker": "Mayor", "quote": "We are ready.", "timecode": "00:01:12"}],
            "mentioned_locations": [{"name": "Osaka", "context": "flooded district"}],
            "importance_score": {"rating": "8/10", "factors": ["casualties"], "rationale": "Major event"},
            "related_news": [],
            "topics": ["weather", "disaster"],
            "keywords": [{"term": "flood", "category": "event"}]
        })
    }

    #[test]
    fn test_from_json_full() {
        let result = AnalysisResult::from_json(&sample()).unwrap();
        assert_eq!(result.short_summary.as_deref(), Some("Floods hit the city."));
        assert_eq!(
            result.bulleted_summary.as_deref(),
            Some("River rose\nRoads closed")
        );
        assert!(result.has_narrative());
        assert!(!result.is_failed());

        let bites = result.bites().unwrap();
        assert_eq!(bites.len(), 1);
        assert_eq!(bites[0].speaker.as_deref(), Some("Mayor"));

        let score = result.importance_score().unwrap().unwrap();
        assert_eq!(score.rating, Some(8.0));
        assert_eq!(score.factors, vec!["casualties"]);

        assert_eq!(result.topics().unwrap(), vec!["weather", "disaster"]);
        assert_eq!(result.keywords().unwrap()[0].term.as_deref(), Some("flood"));
        assert!(result.related_news().unwrap().is_empty());
        assert_eq!(
            result.mentioned_locations().unwrap()[0].name.as_deref(),
            Some("Osaka")
        );
    }

    #[test]
    fn test_from_json_schema_violations() {
        assert!(AnalysisResult::from_json(&json!("text")).is_err());
        assert!(AnalysisResult::from_json(&json!({"transcript": ["a"]})).is_err());
        assert!(AnalysisResult::from_json(&json!({"bulleted_summary": [1, 2]})).is_err());
    }

    #[test]
    fn test_failed_result_has_no_narrative() {
        let result = AnalysisResult::failed(7, "upstream timeout", Some("v2".into()));
        assert!(result.is_failed());
        assert!(!result.has_narrative());
        assert_eq!(result.video_id, 7);
        assert!(result.bites().unwrap().is_empty());
        assert_eq!(result.importance_score().unwrap(), None);
    }
}
