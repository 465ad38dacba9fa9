//! Persistence gateway for video records and analysis results.
//!
//! [`VideoStore`] is the interface the pipeline depends on;
//! [`DieselVideoRepository`] implements it on SQLite through diesel-async.

pub mod diesel_context;
pub mod diesel_models;
pub mod diesel_pool;
pub mod diesel_video;
pub mod util;

pub use diesel_context::DieselDbContext;
pub use diesel_pool::{AsyncSqlitePool, DieselError};
pub use diesel_video::DieselVideoRepository;
pub use util::{parse_datetime, parse_datetime_opt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{AnalysisResult, AnalysisStatus, VideoRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] DieselError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("video {0} not found")]
    NotFound(i64),
    #[error("invalid row for video {id}: {reason}")]
    InvalidRow { id: i64, reason: String },
}

/// Column used to order listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    DiscoveredAt,
    PublishedAt,
    AnalyzedAt,
    Title,
    Duration,
    Id,
}

impl SortField {
    /// Parse a user-supplied column name; unknown names sort by discovery time.
    pub fn parse(s: &str) -> Self {
        match s {
            "published_at" => Self::PublishedAt,
            "analyzed_at" => Self::AnalyzedAt,
            "title" => Self::Title,
            "duration_secs" | "duration" => Self::Duration,
            "id" => Self::Id,
            _ => Self::DiscoveredAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Paging, search and ordering for record listings.
#[derive(Debug, Clone)]
pub struct VideoQuery {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl Default for VideoQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            search: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Persistence operations the pipeline relies on.
///
/// Implementations own transaction discipline: find-or-create and the
/// result upsert must be atomic from the caller's point of view.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Resolve a record's identity to a row id, creating the row if needed.
    ///
    /// Looks up `(source_name, source_id)`, then `nas_path`. A record whose
    /// `id` matches the resolved row is written back in full (the merge
    /// commit path); a fresh discovery only advances `discovered_at`.
    async fn find_or_create_video(&self, record: &VideoRecord) -> Result<i64, StoreError>;

    async fn get_video_by_id(&self, id: i64) -> Result<Option<VideoRecord>, StoreError>;

    /// Records in any of `statuses`, oldest discovered first.
    async fn get_videos_by_status(
        &self,
        statuses: &[AnalysisStatus],
        limit: usize,
    ) -> Result<Vec<VideoRecord>, StoreError>;

    async fn update_status(
        &self,
        id: i64,
        status: AnalysisStatus,
        analyzed_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Upsert keyed by `video_id`.
    async fn save_analysis_result(&self, result: &AnalysisResult) -> Result<(), StoreError>;

    async fn get_analysis_result(&self, video_id: i64) -> Result<Option<AnalysisResult>, StoreError>;

    /// Records matching `query` plus the analysis results belonging to them.
    async fn get_all_with_analysis(
        &self,
        query: &VideoQuery,
    ) -> Result<(Vec<VideoRecord>, Vec<AnalysisResult>), StoreError>;

    /// Number of records per status (statuses with no records are omitted).
    async fn count_by_status(&self) -> Result<Vec<(AnalysisStatus, i64)>, StoreError>;
}
