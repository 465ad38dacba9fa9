//! API endpoint handlers.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::super::AppState;
use crate::models::{AnalysisResult, AnalysisStatus, VideoRecord};
use crate::pipeline::Stage;
use crate::repository::{SortField, SortOrder, VideoQuery};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// Record counts per status and whether each stage is running.
pub async fn api_status(State(state): State<AppState>) -> Response {
    let counts = match state.pipeline.store().count_by_status().await {
        Ok(counts) => counts,
        Err(e) => return internal_error(e),
    };

    let mut by_status = serde_json::Map::new();
    for status in AnalysisStatus::ALL {
        let count = counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        by_status.insert(status.as_str().to_string(), count.into());
    }
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    Json(serde_json::json!({
        "total": total,
        "counts": by_status,
        "running": {
            "text_analysis": state.pipeline.is_running(Stage::Text),
            "video_analysis": state.pipeline.is_running(Stage::Video),
        },
    }))
    .into_response()
}

/// Query parameters for the record listing.
#[derive(Debug, Default, Deserialize)]
pub struct VideoListParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl VideoListParams {
    fn to_query(&self) -> VideoQuery {
        VideoQuery {
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            offset: self.offset.unwrap_or(0).max(0),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            sort_by: self
                .sort_by
                .as_deref()
                .map(SortField::parse)
                .unwrap_or_default(),
            sort_order: self
                .sort_order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct VideoEntry {
    #[serde(flatten)]
    video: VideoRecord,
    analysis: Option<AnalysisResult>,
}

/// Records joined with their analysis results.
pub async fn api_videos(
    State(state): State<AppState>,
    Query(params): Query<VideoListParams>,
) -> Response {
    let query = params.to_query();
    let (records, results) = match state.pipeline.store().get_all_with_analysis(&query).await {
        Ok(found) => found,
        Err(e) => return internal_error(e),
    };

    let mut results: HashMap<i64, AnalysisResult> =
        results.into_iter().map(|r| (r.video_id, r)).collect();
    let items: Vec<VideoEntry> = records
        .into_iter()
        .map(|video| {
            let analysis = video.id.and_then(|id| results.remove(&id));
            VideoEntry { video, analysis }
        })
        .collect();

    Json(serde_json::json!({
        "items": items,
        "limit": query.limit,
        "offset": query.offset,
    }))
    .into_response()
}
