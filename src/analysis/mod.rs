//! AI-backed extraction stages.
//!
//! - [`TextMetadataExtractor`]: sidecar text to [`ParsedMetadata`](crate::models::ParsedMetadata)
//! - [`VideoContentAnalyzer`]: video bytes to [`AnalysisResult`](crate::models::AnalysisResult)
//!
//! Both share [`ResponseSanitizer`] and the candidate checks in
//! [`response_text`].

mod sanitize;
mod text;
mod video;

pub use sanitize::{FormatError, ResponseSanitizer};
pub use text::TextMetadataExtractor;
pub use video::{mime_type_for, VideoContentAnalyzer};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::gemini::{GeminiError, GenerateResponse};

/// Maximum characters of a raw model answer included in logs.
pub const RAW_LOG_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("video file missing: {0}")]
    MissingFile(String),

    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("response does not match the expected schema: {reason}")]
    Schema { reason: String, raw: String },

    #[error("model returned an empty response")]
    EmptyResult,

    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),
}

impl AnalysisError {
    /// Raw model output attached to the error, if any.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Format(e) => Some(&e.raw),
            Self::Schema { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

impl From<GeminiError> for AnalysisError {
    fn from(e: GeminiError) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// Validate a generation response and concatenate its answer text.
///
/// No candidates, a blocked prompt, or a candidate whose content was
/// withheld for a non-benign finish reason are upstream failures. A blank
/// answer is [`AnalysisError::EmptyResult`].
pub fn response_text(response: GenerateResponse) -> Result<String, AnalysisError> {
    if let Some(reason) = response.block_reason {
        return Err(AnalysisError::Upstream(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::Upstream("response contained no candidates".to_string()))?;

    if candidate.text_parts.is_empty() && !candidate.finish_reason.is_benign() {
        return Err(AnalysisError::Upstream(format!(
            "content withheld, finish reason {}",
            candidate.finish_reason
        )));
    }

    let text = candidate.text_parts.concat();
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResult);
    }
    Ok(text)
}

/// First `limit` characters of `s`, for log lines.
pub(crate) fn truncate_for_log(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{Candidate, FinishReason};

    #[test]
    fn test_response_text_concatenates_parts() {
        let response = GenerateResponse::single(Candidate {
            text_parts: vec!["{\"a\":".into(), " 1}".into()],
            finish_reason: FinishReason::Stop,
        });
        assert_eq!(response_text(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_response_text_rejections() {
        let no_candidates = GenerateResponse::default();
        assert!(matches!(
            response_text(no_candidates),
            Err(AnalysisError::Upstream(_))
        ));

        let withheld = GenerateResponse::single(Candidate {
            text_parts: vec![],
            finish_reason: FinishReason::Safety,
        });
        let err = response_text(withheld).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let blocked = GenerateResponse {
            candidates: vec![],
            block_reason: Some("OTHER".into()),
        };
        assert!(matches!(response_text(blocked), Err(AnalysisError::Upstream(_))));

        let empty = GenerateResponse::single(Candidate {
            text_parts: vec![],
            finish_reason: FinishReason::Stop,
        });
        assert!(matches!(response_text(empty), Err(AnalysisError::EmptyResult)));

        let blank = GenerateResponse::single(Candidate::text("   "));
        assert!(matches!(response_text(blank), Err(AnalysisError::EmptyResult)));
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("東京タワー", 2), "東京");
        assert_eq!(truncate_for_log("short", 500), "short");
    }
}
