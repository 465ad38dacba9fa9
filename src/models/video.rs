//! Video record and analysis status models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FileGroup;

/// Position of a video in the two-stage analysis state machine.
///
/// ```text
/// pending -> metadata_extracting -> metadata_extracted -> processing -> completed
///                  |                                          |
///                  v                                          v
///          txt_analysis_failed                      video_analysis_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    MetadataExtracting,
    MetadataExtracted,
    Processing,
    Completed,
    TxtAnalysisFailed,
    VideoAnalysisFailed,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 7] = [
        Self::Pending,
        Self::MetadataExtracting,
        Self::MetadataExtracted,
        Self::Processing,
        Self::Completed,
        Self::TxtAnalysisFailed,
        Self::VideoAnalysisFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::MetadataExtracting => "metadata_extracting",
            Self::MetadataExtracted => "metadata_extracted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::TxtAnalysisFailed => "txt_analysis_failed",
            Self::VideoAnalysisFailed => "video_analysis_failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "metadata_extracting" => Some(Self::MetadataExtracting),
            "metadata_extracted" => Some(Self::MetadataExtracted),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "txt_analysis_failed" => Some(Self::TxtAnalysisFailed),
            "video_analysis_failed" => Some(Self::VideoAnalysisFailed),
            _ => None,
        }
    }

    /// Stage 1 has already produced metadata, or a later stage has moved on.
    pub fn text_stage_settled(&self) -> bool {
        matches!(
            self,
            Self::MetadataExtracted | Self::Processing | Self::Completed | Self::VideoAnalysisFailed
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::TxtAnalysisFailed | Self::VideoAnalysisFailed)
    }

    /// No further automatic transition happens from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::TxtAnalysisFailed | Self::VideoAnalysisFailed
        )
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered media item.
///
/// Identity is the `(source_name, source_id)` pair, with `nas_path` as a
/// fallback key. `id` is `None` until the record has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: Option<i64>,
    pub source_name: String,
    pub source_id: String,
    /// Video path relative to the media root.
    pub nas_path: String,
    pub title: Option<String>,
    /// Modification time of the video when it was last discovered.
    pub discovered_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub shotlist_content: Option<String>,
    pub view_link: Option<String>,
    pub subjects: Vec<String>,
    pub location: Option<String>,
    pub restrictions: Option<String>,
    pub translated_restrictions: Option<String>,
    /// Opaque metadata from the upstream source, carried through untouched.
    pub source_metadata: Option<serde_json::Value>,
    pub analysis_status: AnalysisStatus,
    /// Time of the last status transition.
    pub analyzed_at: Option<DateTime<Utc>>,
    pub prompt_version: Option<String>,
    pub last_error: Option<String>,
}

impl VideoRecord {
    /// A fresh `pending` record for a newly scanned file group.
    pub fn discovered(group: &FileGroup) -> Self {
        Self {
            id: None,
            source_name: group.source_name.clone(),
            source_id: group.source_id.clone(),
            nas_path: group.relative_path.clone(),
            title: None,
            discovered_at: group.modified_at,
            published_at: None,
            duration_secs: None,
            shotlist_content: None,
            view_link: None,
            subjects: Vec::new(),
            location: None,
            restrictions: None,
            translated_restrictions: None,
            source_metadata: None,
            analysis_status: AnalysisStatus::Pending,
            analyzed_at: None,
            prompt_version: None,
            last_error: None,
        }
    }

    /// Display label: the title when known, otherwise the relative path.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.nas_path)
    }
}
