//! Streaming of indexed video files.

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::super::AppState;
use crate::storage::StorageError;

/// Serve `/media/{relative path}` from the media root.
///
/// Range and conditional requests are answered by [`ServeFile`], so players
/// can seek.
pub async fn media_file(
    State(state): State<AppState>,
    Path(relative): Path<String>,
    request: Request,
) -> Response {
    let path = match state.pipeline.storage().resolve_absolute_path(&relative).await {
        Ok(path) => path,
        Err(e) => {
            let status = match e {
                StorageError::Missing(_) => StatusCode::NOT_FOUND,
                StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                StorageError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::debug!("Media request for {} refused: {}", relative, e);
            return (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response();
        }
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(e) => match e {},
    }
}
