//! Google Gemini generation client.
//!
//! [`GenerativeModel`] is the seam the extractors depend on; [`GeminiClient`]
//! implements it over the `generateContent` REST endpoint. Requests are
//! retried on HTTP 429 with exponential backoff, honoring `Retry-After`.

mod client;
mod retry;
mod wire;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{GeminiClient, DEFAULT_MODEL};
pub use retry::{backoff_delay, parse_retry_after, MAX_RETRIES};

/// MIME type requested for every structured answer.
pub const JSON_MIME_TYPE: &str = "application/json";

/// One piece of request content.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A single generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub parts: Vec<Part>,
    pub response_mime_type: Option<String>,
    /// Per-request deadline enforced by the HTTP client.
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    /// A request expecting a JSON-only answer.
    pub fn json(parts: Vec<Part>) -> Self {
        Self {
            parts,
            response_mime_type: Some(JSON_MIME_TYPE.to_string()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why the model stopped producing a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Unspecified,
    MaxTokens,
    Safety,
    Recitation,
    Other(String),
}

impl FinishReason {
    pub fn from_api(value: Option<&str>) -> Self {
        match value {
            None | Some("FINISH_REASON_UNSPECIFIED") => Self::Unspecified,
            Some("STOP") => Self::Stop,
            Some("MAX_TOKENS") => Self::MaxTokens,
            Some("SAFETY") => Self::Safety,
            Some("RECITATION") => Self::Recitation,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// A normal stop; anything else means content may have been withheld.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Stop | Self::Unspecified)
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "STOP"),
            Self::Unspecified => write!(f, "FINISH_REASON_UNSPECIFIED"),
            Self::MaxTokens => write!(f, "MAX_TOKENS"),
            Self::Safety => write!(f, "SAFETY"),
            Self::Recitation => write!(f, "RECITATION"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text_parts: Vec<String>,
    pub finish_reason: FinishReason,
}

impl Candidate {
    /// A candidate that stopped normally with a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_parts: vec![text.into()],
            finish_reason: FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    pub candidates: Vec<Candidate>,
    /// Set when the prompt itself was blocked.
    pub block_reason: Option<String>,
}

impl GenerateResponse {
    pub fn single(candidate: Candidate) -> Self {
        Self {
            candidates: vec![candidate],
            block_reason: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/")]
    MissingApiKey,
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),
    #[error("Gemini API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Gemini rate limited after {attempts} attempts")]
    RateLimited {
        attempts: u32,
        retry_after_secs: Option<u64>,
    },
}

impl From<reqwest::Error> for GeminiError {
    /// The request URL is dropped; error text ends up in stored records.
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

/// A text or multimodal generation backend.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GeminiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_from_api() {
        assert_eq!(FinishReason::from_api(Some("STOP")), FinishReason::Stop);
        assert_eq!(FinishReason::from_api(None), FinishReason::Unspecified);
        assert_eq!(
            FinishReason::from_api(Some("BLOCKLIST")),
            FinishReason::Other("BLOCKLIST".to_string())
        );
        assert!(FinishReason::Stop.is_benign());
        assert!(!FinishReason::Safety.is_benign());
        assert!(!FinishReason::MaxTokens.is_benign());
    }

    #[test]
    fn test_json_request_defaults() {
        let request = GenerateRequest::json(vec![Part::Text("hi".into())])
            .with_timeout(Duration::from_secs(5));
        assert_eq!(request.response_mime_type.as_deref(), Some(JSON_MIME_TYPE));
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }
}
