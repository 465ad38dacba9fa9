use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use crate::analysis::testing::ScriptedModel;
use crate::analysis::{TextMetadataExtractor, VideoContentAnalyzer};
use crate::config::{PromptCatalog, PromptsConfig};
use crate::models::{AnalysisResult, AnalysisStatus, FileGroup, VideoRecord};
use crate::pipeline::{AnalysisPipeline, Stage};
use crate::repository::{DieselDbContext, VideoStore};
use crate::scanner::FileGroupScanner;
use crate::server::{create_router, AppState};
use crate::storage::FsMediaStorage;

struct TestApp {
    router: Router,
    pipeline: Arc<AnalysisPipeline>,
    media: TempDir,
    _db: TempDir,
}

async fn app() -> TestApp {
    let db = tempdir().unwrap();
    let media = tempdir().unwrap();
    let ctx = DieselDbContext::from_sqlite_path(&db.path().join("test.db"));
    ctx.init_schema().await.unwrap();

    let pipeline = Arc::new(AnalysisPipeline::new(
        Arc::new(ctx.videos()),
        Arc::new(FsMediaStorage::new(media.path())),
        FileGroupScanner::new(media.path()),
        TextMetadataExtractor::new(Arc::new(ScriptedModel::new())),
        VideoContentAnalyzer::new(Arc::new(ScriptedModel::new())),
        PromptCatalog::new(PromptsConfig::default(), media.path()),
    ));

    TestApp {
        router: create_router(AppState::new(pipeline.clone())),
        pipeline,
        media,
        _db: db,
    }
}

fn record(source_id: &str, title: &str) -> VideoRecord {
    let group = FileGroup {
        video_path: format!("/media/ap/{}/clip.mp4", source_id).into(),
        sidecar_path: format!("/media/ap/{}/clip.txt", source_id).into(),
        source_name: "ap".into(),
        source_id: source_id.into(),
        relative_path: format!("ap/{}/clip.mp4", source_id),
        modified_at: Utc::now(),
    };
    let mut record = VideoRecord::discovered(&group);
    record.title = Some(title.into());
    record
}

async fn send_raw(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = send_raw(router, request).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, _) = send(&app.router, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_trigger_accepted_then_conflict() {
    let app = app().await;

    let (status, body) = send(&app.router, "POST", "/api/trigger/video-analysis").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["message"].as_str().unwrap().contains("Video analysis"));

    assert!(app.pipeline.try_begin_run(Stage::Text));
    let (status, body) = send(&app.router, "POST", "/api/trigger/text-analysis").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("text analysis"));

    let (status, _) = send(&app.router, "POST", "/api/trigger/analysis").await;
    assert_eq!(status, StatusCode::CONFLICT);
    app.pipeline.end_run(Stage::Text);
}

#[tokio::test]
async fn test_status_counts_every_status() {
    let app = app().await;
    let store = app.pipeline.store();
    let id = store.find_or_create_video(&record("1", "Flood")).await.unwrap();
    store.find_or_create_video(&record("2", "Fire")).await.unwrap();
    store
        .update_status(id, AnalysisStatus::Completed, Utc::now(), None)
        .await
        .unwrap();

    let (status, body) = send(&app.router, "GET", "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["counts"]["completed"], 1);
    assert_eq!(body["counts"]["pending"], 1);
    assert_eq!(body["counts"]["video_analysis_failed"], 0);
    assert_eq!(body["running"]["text_analysis"], false);
}

#[tokio::test]
async fn test_videos_lists_records_with_analysis() {
    let app = app().await;
    let store = app.pipeline.store();
    let id = store.find_or_create_video(&record("1", "Flood")).await.unwrap();
    store.find_or_create_video(&record("2", "Fire")).await.unwrap();
    store
        .save_analysis_result(&AnalysisResult {
            video_id: id,
            short_summary: Some("Water everywhere".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, body) = send(&app.router, "GET", "/api/videos?search=Flood").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Flood");
    assert_eq!(items[0]["analysis"]["short_summary"], "Water everywhere");

    let (_, body) = send(&app.router, "GET", "/api/videos?limit=9999&sort_by=title&sort_order=asc").await;
    assert_eq!(body["limit"], 500);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["title"], "Fire");
    assert!(items[0]["analysis"].is_null());
}

#[tokio::test]
async fn test_media_serves_files_with_ranges() {
    let app = app().await;
    let dir = app.media.path().join("ap/1");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("clip.mp4"), b"0123456789").unwrap();

    let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    let (status, body) = send_raw(&app.router, get("/media/ap/1/clip.mp4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"0123456789");

    let ranged = Request::builder()
        .uri("/media/ap/1/clip.mp4")
        .header("range", "bytes=2-4")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_raw(&app.router, ranged).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"234");

    let (status, _) = send_raw(&app.router, get("/media/ap/1/gone.mp4")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_raw(&app.router, get("/media/ap/../../etc/passwd")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
