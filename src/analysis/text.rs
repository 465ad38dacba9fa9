//! Stage 1: metadata extraction from sidecar text.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::{response_text, truncate_for_log, AnalysisError, ResponseSanitizer, RAW_LOG_LIMIT};
use crate::gemini::{GenerateRequest, GenerativeModel, Part};
use crate::models::ParsedMetadata;

/// Default deadline for one text analysis call.
pub const DEFAULT_TEXT_TIMEOUT: Duration = Duration::from_secs(180);

/// Sends sidecar text to the text model and parses the JSON answer.
#[derive(Clone)]
pub struct TextMetadataExtractor {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl TextMetadataExtractor {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_TEXT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read a sidecar file (lossy UTF-8) and extract its metadata.
    pub async fn extract_file(
        &self,
        path: &Path,
        prompt: &str,
    ) -> Result<ParsedMetadata, AnalysisError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.extract(&String::from_utf8_lossy(&bytes), prompt).await
    }

    /// Extract metadata from sidecar text.
    ///
    /// Blank text short-circuits to empty metadata without calling the
    /// model. A non-blank answer that cannot be decoded is a schema error,
    /// never an empty result.
    pub async fn extract(
        &self,
        sidecar_text: &str,
        prompt: &str,
    ) -> Result<ParsedMetadata, AnalysisError> {
        if sidecar_text.trim().is_empty() {
            debug!("Blank sidecar text, skipping text analysis");
            return Ok(ParsedMetadata::default());
        }

        let request = GenerateRequest::json(vec![
            Part::Text(prompt.to_string()),
            Part::Text(sidecar_text.to_string()),
        ])
        .with_timeout(self.timeout);

        let response = tokio::time::timeout(self.timeout, self.model.generate(&request))
            .await
            .map_err(|_| AnalysisError::Timeout(self.timeout))??;
        let raw = response_text(response)?;

        let value = ResponseSanitizer::parse(&raw).map_err(|e| {
            error!(
                "Text analysis answer is not JSON: {}\nRaw (truncated): {}",
                e.reason,
                truncate_for_log(&raw, RAW_LOG_LIMIT)
            );
            AnalysisError::Schema {
                reason: e.reason,
                raw: e.raw,
            }
        })?;

        ParsedMetadata::from_json(&value).map_err(|reason| {
            error!(
                "Text analysis answer has unexpected shape: {}\nRaw (truncated): {}",
                reason,
                truncate_for_log(&raw, RAW_LOG_LIMIT)
            );
            AnalysisError::Schema {
                reason,
                raw: raw.clone(),
            }
        })
    }
}
