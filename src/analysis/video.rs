//! Stage 2: multimodal analysis of the video itself.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use super::{response_text, truncate_for_log, AnalysisError, ResponseSanitizer, RAW_LOG_LIMIT};
use crate::gemini::{GenerateRequest, GenerativeModel, Part};
use crate::models::AnalysisResult;

/// Default deadline for one video analysis call.
pub const DEFAULT_VIDEO_TIMEOUT: Duration = Duration::from_secs(20 * 60);

const FALLBACK_MIME: &str = "video/mp4";

/// MIME type for a video path, from a fixed extension table.
///
/// Unknown extensions fall back to `video/mp4` with a warning.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "ts" => "video/mp2t",
        _ => {
            warn!(
                "Unknown video extension '{}' for {}, sending as {}",
                ext,
                path.display(),
                FALLBACK_MIME
            );
            FALLBACK_MIME
        }
    }
}

/// Sends a whole video to the multimodal model and parses its annotations.
#[derive(Clone)]
pub struct VideoContentAnalyzer {
    model: Arc<dyn GenerativeModel>,
    timeout: Duration,
}

impl VideoContentAnalyzer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self {
            model,
            timeout: DEFAULT_VIDEO_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Analyze the video at `path`.
    ///
    /// The returned result carries no video id, prompt version or
    /// timestamps; the caller stamps those before persisting.
    pub async fn analyze(&self, path: &Path, prompt: &str) -> Result<AnalysisResult, AnalysisError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mime_type = mime_type_for(path);

        info!(
            "Sending {} ({} bytes, {}) to {}",
            path.display(),
            bytes.len(),
            mime_type,
            self.model.model_name()
        );

        let request = GenerateRequest::json(vec![
            Part::Text(prompt.to_string()),
            Part::InlineData {
                mime_type: mime_type.to_string(),
                data: bytes,
            },
        ])
        .with_timeout(self.timeout);

        let response = tokio::time::timeout(self.timeout, self.model.generate(&request))
            .await
            .map_err(|_| AnalysisError::Timeout(self.timeout))??;
        let raw = response_text(response)?;

        let value = ResponseSanitizer::parse(&raw).map_err(|e| {
            error!(
                "Video analysis answer for {} is not JSON: {}\nRaw (truncated): {}",
                path.display(),
                e.reason,
                truncate_for_log(&raw, RAW_LOG_LIMIT)
            );
            AnalysisError::Format(e)
        })?;

        AnalysisResult::from_json(&value).map_err(|reason| {
            error!(
                "Video analysis answer for {} has unexpected shape: {}\nRaw (truncated): {}",
                path.display(),
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
