//! Serde types for the `generateContent` REST payloads.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{Candidate, FinishReason, GenerateRequest, GenerateResponse, Part};

#[derive(Debug, Serialize)]
pub(super) struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

impl From<&GenerateRequest> for GeminiRequest {
    fn from(request: &GenerateRequest) -> Self {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart::Text { text: text.clone() },
                Part::InlineData { mime_type, data } => GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: mime_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(data),
                    },
                },
            })
            .collect();

        Self {
            contents: vec![GeminiContent {
                role: "user",
                parts,
            }],
            generation_config: request
                .response_mime_type
                .as_ref()
                .map(|mime| GeminiGenerationConfig {
                    response_mime_type: mime.clone(),
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GeminiPromptFeedback>,
    pub(super) error: Option<GeminiApiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct GeminiApiError {
    #[serde(default)]
    pub(super) code: u16,
    pub(super) message: String,
}

impl From<GeminiResponse> for GenerateResponse {
    fn from(response: GeminiResponse) -> Self {
        let candidates = response
            .candidates
            .into_iter()
            .map(|candidate| Candidate {
                text_parts: candidate
                    .content
                    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                    .unwrap_or_default(),
                finish_reason: FinishReason::from_api(candidate.finish_reason.as_deref()),
            })
            .collect();

        Self {
            candidates,
            block_reason: response.prompt_feedback.and_then(|f| f.block_reason),
        }
    }
}
