//! Manual pipeline triggers.
//!
//! Each handler starts its run in the background and answers at once:
//! `202` when started, `409` when the stage is already running.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::super::AppState;
use crate::pipeline::TriggerKind;

fn start(state: &AppState, kind: TriggerKind, what: &str) -> impl IntoResponse {
    match state.pipeline.trigger(kind) {
        Ok(_) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "message": format!("{} triggered, running in the background", what),
            })),
        ),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}

/// Run both stages.
pub async fn trigger_analysis(State(state): State<AppState>) -> impl IntoResponse {
    start(&state, TriggerKind::Full, "Analysis")
}

pub async fn trigger_text_analysis(State(state): State<AppState>) -> impl IntoResponse {
    start(&state, TriggerKind::Text, "Text analysis")
}

pub async fn trigger_video_analysis(State(state): State<AppState>) -> impl IntoResponse {
    start(&state, TriggerKind::Video, "Video analysis")
}
