//! Two-stage analysis pipeline.
//!
//! Stage 1 scans the media root and extracts metadata from each sidecar
//! text. Stage 2 sends videos whose metadata is in place to the multimodal
//! model. Every item moves through [`AnalysisStatus`]; a failing item is
//! marked failed and the batch continues.
//!
//! Each stage has a [`RunGuard`] so that scheduler ticks and manual
//! triggers never run the same stage twice at once.

mod guard;

pub use guard::{RunGuard, RunPermit};

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisError, TextMetadataExtractor, VideoContentAnalyzer};
use crate::config::{Config, PromptCatalog, PromptKind, ResolvedPrompt, Settings};
use crate::gemini::{GeminiClient, GenerativeModel};
use crate::models::{AnalysisResult, AnalysisStatus, FileGroup, VideoRecord};
use crate::repository::{StoreError, VideoStore};
use crate::scanner::{FileGroupScanner, ScanError};
use crate::storage::{FsMediaStorage, MediaStorage};

/// Default number of videos analyzed per stage-2 run.
pub const DEFAULT_VIDEO_BATCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Text,
    Video,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text analysis"),
            Self::Video => f.write_str("video analysis"),
        }
    }
}

/// Who started a run.
///
/// Failed items are only retried when an operator asks for it: scheduled
/// runs leave both failed statuses alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

impl RunTrigger {
    fn skips_text(self, status: AnalysisStatus) -> bool {
        status.text_stage_settled()
            || (self == Self::Scheduled && status == AnalysisStatus::TxtAnalysisFailed)
    }

    fn video_queue(self) -> &'static [AnalysisStatus] {
        match self {
            Self::Scheduled => &[AnalysisStatus::MetadataExtracted],
            Self::Manual => &[
                AnalysisStatus::MetadataExtracted,
                AnalysisStatus::VideoAnalysisFailed,
            ],
        }
    }
}

/// What a manual trigger runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Text,
    Video,
    Full,
}

impl TriggerKind {
    fn stages(self) -> &'static [Stage] {
        match self {
            Self::Text => &[Stage::Text],
            Self::Video => &[Stage::Video],
            Self::Full => &[Stage::Text, Stage::Video],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("{0} is already running")]
    AlreadyRunning(Stage),
}

/// Failure of a whole stage run (individual items never produce one).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(String),
}

/// Per-run tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StageReport {
    fn record(&mut self, outcome: Outcome) {
        self.processed += 1;
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl std::fmt::Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed, {} succeeded, {} failed, {} skipped",
            self.processed, self.succeeded, self.failed, self.skipped
        )
    }
}

/// Reports of a combined run. `None` means the stage did not run to
/// completion (the reason has been logged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub text: Option<StageReport>,
    pub video: Option<StageReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
    Skipped,
}

/// The orchestrator. Shared behind an `Arc` by the scheduler, the HTTP
/// server and manual triggers.
pub struct AnalysisPipeline {
    store: Arc<dyn VideoStore>,
    storage: Arc<dyn MediaStorage>,
    scanner: FileGroupScanner,
    text: TextMetadataExtractor,
    video: VideoContentAnalyzer,
    prompts: PromptCatalog,
    video_batch_limit: usize,
    text_guard: RunGuard,
    video_guard: RunGuard,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn VideoStore>,
        storage: Arc<dyn MediaStorage>,
        scanner: FileGroupScanner,
        text: TextMetadataExtractor,
        video: VideoContentAnalyzer,
        prompts: PromptCatalog,
    ) -> Self {
        Self {
            store,
            storage,
            scanner,
            text,
            video,
            prompts,
            video_batch_limit: DEFAULT_VIDEO_BATCH_LIMIT,
            text_guard: RunGuard::new(),
            video_guard: RunGuard::new(),
        }
    }

    pub fn with_video_batch_limit(mut self, limit: usize) -> Self {
        self.video_batch_limit = limit;
        self
    }

    /// Wire up the production collaborators from loaded configuration.
    pub fn from_config(settings: &Settings, config: &Config, store: Arc<dyn VideoStore>) -> Self {
        let client = |model: &str| -> Arc<dyn GenerativeModel> {
            let client = GeminiClient::new(model);
            let client = match config.gemini.api_key.as_deref() {
                Some(key) if !key.is_empty() => client.with_api_key(key),
                _ => client,
            };
            if !client.has_api_key() {
                warn!("No Gemini API key configured, analysis calls will fail");
            }
            Arc::new(client)
        };

        let text = TextMetadataExtractor::new(client(&config.gemini.text_model))
            .with_timeout(config.pipeline.text_timeout());
        let video = VideoContentAnalyzer::new(client(&config.gemini.video_model))
            .with_timeout(config.pipeline.video_timeout());

        Self::new(
            store,
            Arc::new(FsMediaStorage::new(&settings.media_root)),
            FileGroupScanner::new(&settings.media_root),
            text,
            video,
            config.prompt_catalog(),
        )
        .with_video_batch_limit(config.pipeline.video_batch_limit)
    }

    pub fn store(&self) -> &Arc<dyn VideoStore> {
        &self.store
    }

    pub fn video_batch_limit(&self) -> usize {
        self.video_batch_limit
    }

    fn guard(&self, stage: Stage) -> &RunGuard {
        match stage {
            Stage::Text => &self.text_guard,
            Stage::Video => &self.video_guard,
        }
    }

    /// Mark `stage` running. Returns `false` if it already is.
    pub fn try_begin_run(&self, stage: Stage) -> bool {
        self.guard(stage).try_begin()
    }

    pub fn end_run(&self, stage: Stage) {
        self.guard(stage).end()
    }

    pub fn is_running(&self, stage: Stage) -> bool {
        self.guard(stage).is_running()
    }

    // ========================================================================
    // Stage 1
    // ========================================================================

    /// Scan the media root and extract metadata for every unsettled group.
    pub async fn run_text_extraction(
        &self,
        trigger: RunTrigger,
    ) -> Result<StageReport, PipelineError> {
        let scanner = self.scanner.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))??;

        let mut report = StageReport::default();
        if scan.groups.is_empty() {
            info!("No video/sidecar pairs under {}", self.scanner.root().display());
            return Ok(report);
        }

        let prompt = self.prompts.resolve(PromptKind::Text).await;
        info!(
            "Text analysis: {} pairs found, prompt version {}",
            scan.groups.len(),
            prompt.version
        );

        for group in &scan.groups {
            let outcome = self.extract_group(group, &prompt, trigger).await;
            report.record(outcome);
        }

        info!("Text analysis finished: {}", report);
        Ok(report)
    }

    async fn extract_group(
        &self,
        group: &FileGroup,
        prompt: &ResolvedPrompt,
        trigger: RunTrigger,
    ) -> Outcome {
        let id = match self
            .store
            .find_or_create_video(&VideoRecord::discovered(group))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!("Cannot register {}: {}", group.relative_path, e);
                return Outcome::Failed;
            }
        };

        let record = match self.store.get_video_by_id(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                error!("Video {} vanished right after registration", id);
                return Outcome::Failed;
            }
            Err(e) => {
                error!("Cannot load video {}: {}", id, e);
                return Outcome::Failed;
            }
        };

        if trigger.skips_text(record.analysis_status) {
            debug!(
                "Skipping {} (status {})",
                group.relative_path, record.analysis_status
            );
            return Outcome::Skipped;
        }

        info!("Extracting metadata for {}", group.relative_path);
        self.mark(id, AnalysisStatus::MetadataExtracting, None).await;

        let parsed = match self.text.extract_file(&group.sidecar_path, &prompt.text).await {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("Text analysis failed for {}: {}", group.relative_path, e);
                self.mark(id, AnalysisStatus::TxtAnalysisFailed, Some(&e.to_string()))
                    .await;
                return Outcome::Failed;
            }
        };

        let mut merged = record;
        parsed.merge_into(&mut merged);
        merged.analysis_status = AnalysisStatus::MetadataExtracted;
        merged.analyzed_at = Some(Utc::now());
        merged.prompt_version = Some(prompt.version.clone());
        merged.last_error = None;
        merged.discovered_at = merged.discovered_at.max(group.modified_at);

        match self.store.find_or_create_video(&merged).await {
            Ok(_) => {
                info!("Metadata extracted for {}", merged.label());
                Outcome::Succeeded
            }
            Err(e) => {
                error!("Cannot save metadata for {}: {}", group.relative_path, e);
                self.mark(
                    id,
                    AnalysisStatus::TxtAnalysisFailed,
                    Some(&format!("failed to save metadata: {}", e)),
                )
                .await;
                Outcome::Failed
            }
        }
    }

    // ========================================================================
    // Stage 2
    // ========================================================================

    /// Analyze up to `limit` videos whose metadata is in place, oldest first.
    pub async fn run_video_analysis(
        &self,
        trigger: RunTrigger,
        limit: usize,
    ) -> Result<StageReport, PipelineError> {
        let queue = self
            .store
            .get_videos_by_status(trigger.video_queue(), limit)
            .await?;

        let mut report = StageReport::default();
        if queue.is_empty() {
            info!("No videos waiting for analysis");
            return Ok(report);
        }

        let prompt = self.prompts.resolve(PromptKind::Video).await;
        info!(
            "Video analysis: {} videos queued, prompt version {}",
            queue.len(),
            prompt.version
        );

        for record in &queue {
            let outcome = self.analyze_record(record, &prompt).await;
            report.record(outcome);
        }

        info!("Video analysis finished: {}", report);
        Ok(report)
    }

    async fn analyze_record(&self, record: &VideoRecord, prompt: &ResolvedPrompt) -> Outcome {
        let Some(id) = record.id else {
            return Outcome::Failed;
        };

        info!("Analyzing {}", record.label());
        self.mark(id, AnalysisStatus::Processing, None).await;

        let path = match self.storage.resolve_absolute_path(&record.nas_path).await {
            Ok(path) => path,
            Err(e) => {
                let err = AnalysisError::MissingFile(format!("{} ({})", record.nas_path, e));
                error!("Cannot analyze video {}: {}", id, err);
                self.fail_video(id, &err.to_string(), prompt).await;
                return Outcome::Failed;
            }
        };

        let mut result = match self.video.analyze(&path, &prompt.text).await {
            Ok(result) => result,
            Err(e) => {
                error!("Video analysis failed for {}: {}", record.nas_path, e);
                self.fail_video(id, &e.to_string(), prompt).await;
                return Outcome::Failed;
            }
        };

        let now = Utc::now();
        result.video_id = id;
        result.prompt_version = Some(prompt.version.clone());
        result.error_message = None;
        result.created_at = Some(now);
        result.updated_at = Some(now);

        if let Err(e) = self.store.save_analysis_result(&result).await {
            error!("Cannot save analysis for {}: {}", record.nas_path, e);
            self.fail_video(id, &format!("failed to save analysis: {}", e), prompt)
                .await;
            return Outcome::Failed;
        }

        match self
            .store
            .update_status(id, AnalysisStatus::Completed, now, None)
            .await
        {
            Ok(()) => {
                info!("Analysis completed for {}", record.label());
                Outcome::Succeeded
            }
            Err(e) => {
                error!("Cannot mark video {} completed: {}", id, e);
                Outcome::Failed
            }
        }
    }

    /// Record a stage-2 failure: an error-only result, then the status.
    async fn fail_video(&self, id: i64, message: &str, prompt: &ResolvedPrompt) {
        let now = Utc::now();
        let mut failed = AnalysisResult::failed(id, message, Some(prompt.version.clone()));
        failed.created_at = Some(now);
        failed.updated_at = Some(now);
        if let Err(e) = self.store.save_analysis_result(&failed).await {
            warn!("Cannot save failure record for video {}: {}", id, e);
        }
        self.mark(id, AnalysisStatus::VideoAnalysisFailed, Some(message))
            .await;
    }

    /// Best-effort status transition.
    async fn mark(&self, id: i64, status: AnalysisStatus, error_message: Option<&str>) {
        if let Err(e) = self
            .store
            .update_status(id, status, Utc::now(), error_message)
            .await
        {
            warn!("Cannot set video {} to {}: {}", id, status, e);
        }
    }

    // ========================================================================
    // Runs
    // ========================================================================

    async fn text_logged(&self, trigger: RunTrigger) -> Option<StageReport> {
        match self.run_text_extraction(trigger).await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Text analysis run failed: {}", e);
                None
            }
        }
    }

    async fn video_logged(&self, trigger: RunTrigger) -> Option<StageReport> {
        match self
            .run_video_analysis(trigger, self.video_batch_limit)
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Video analysis run failed: {}", e);
                None
            }
        }
    }

    /// Stage 1 then stage 2. Stage errors are logged, not returned.
    pub async fn run(&self, trigger: RunTrigger) -> RunSummary {
        RunSummary {
            text: self.text_logged(trigger).await,
            video: self.video_logged(trigger).await,
        }
    }

    /// One scheduler tick. A stage that is already running is skipped.
    pub async fn run_scheduled(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        match self.text_guard.try_acquire() {
            Some(_permit) => summary.text = self.text_logged(RunTrigger::Scheduled).await,
            None => info!("Text analysis already running, skipping this tick"),
        }
        match self.video_guard.try_acquire() {
            Some(_permit) => summary.video = self.video_logged(RunTrigger::Scheduled).await,
            None => info!("Video analysis already running, skipping this tick"),
        }

        summary
    }

    /// Start a manual run in the background.
    ///
    /// The guards are taken before this returns, so a second trigger for a
    /// busy stage fails immediately with [`TriggerError::AlreadyRunning`].
    pub fn trigger(self: &Arc<Self>, kind: TriggerKind) -> Result<JoinHandle<RunSummary>, TriggerError> {
        let mut permits = Vec::with_capacity(2);
        for &stage in kind.stages() {
            match self.guard(stage).try_acquire() {
                Some(permit) => permits.push(permit),
                None => {
                    warn!("Manual {} trigger rejected: already running", stage);
                    return Err(TriggerError::AlreadyRunning(stage));
                }
            }
        }

        info!("Manual {:?} run triggered", kind);
        let pipeline = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let _permits = permits;
            match kind {
                TriggerKind::Text => RunSummary {
                    text: pipeline.text_logged(RunTrigger::Manual).await,
                    video: None,
                },
                TriggerKind::Video => RunSummary {
                    text: None,
                    video: pipeline.video_logged(RunTrigger::Manual).await,
                },
                TriggerKind::Full => pipeline.run(RunTrigger::Manual).await,
            }
        }))
    }

    pub fn storage(&self) -> &Arc<dyn MediaStorage> {
        &self.storage
    }

    /// Media root the scanner walks.
    pub fn media_root(&self) -> &Path {
        self.scanner.root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::ScriptedModel;
    use crate::config::{PromptSetConfig, PromptSource, PromptsConfig, VIDEO_FALLBACK_VERSION};
    use crate::gemini::GeminiError;
    use crate::repository::{DieselDbContext, DieselVideoRepository};
    use std::collections::HashMap;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        pipeline: Arc<AnalysisPipeline>,
        repo: DieselVideoRepository,
        text_model: Arc<ScriptedModel>,
        video_model: Arc<ScriptedModel>,
        media: TempDir,
        _db: TempDir,
    }

    fn prompts() -> PromptsConfig {
        let mut versions = HashMap::new();
        versions.insert(
            "t-v1".to_string(),
            PromptSource::Inline {
                text: "Extract metadata as JSON.".into(),
            },
        );
        PromptsConfig {
            text_analysis: PromptSetConfig {
                current_version: Some("t-v1".into()),
                versions,
            },
            video_analysis: PromptSetConfig::default(),
        }
    }

    async fn harness(text_model: ScriptedModel, video_model: ScriptedModel) -> Harness {
        let db = tempdir().unwrap();
        let media = tempdir().unwrap();
        let ctx = DieselDbContext::from_sqlite_path(&db.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.videos();

        let text_model = Arc::new(text_model);
        let video_model = Arc::new(video_model);
        let pipeline = AnalysisPipeline::new(
            Arc::new(repo.clone()),
            Arc::new(FsMediaStorage::new(media.path())),
            FileGroupScanner::new(media.path()),
            TextMetadataExtractor::new(text_model.clone()),
            VideoContentAnalyzer::new(video_model.clone()),
            PromptCatalog::new(prompts(), media.path()),
        );

        Harness {
            pipeline: Arc::new(pipeline),
            repo,
            text_model,
            video_model,
            media,
            _db: db,
        }
    }

    fn add_pair(media: &Path, source: &str, id: &str, sidecar: &str) {
        let dir = media.join(source).join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip.mp4"), b"\x00\x00\x00\x18ftypmp42").unwrap();
        std::fs::write(dir.join("clip.txt"), sidecar).unwrap();
    }

    async fn only_record(repo: &DieselVideoRepository) -> VideoRecord {
        let (records, _) = repo
            .get_all_with_analysis(&Default::default())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        records.into_iter().next().unwrap()
    }

    #[tokio::test]
    async fn test_text_stage_extracts_and_skips_on_rerun() {
        let h = harness(
            ScriptedModel::new().answer(
                r#"{"title": "Flood", "duration_seconds": "125", "subjects": ["weather"], "creation_date": "2024-05-01 08:00:00"}"#,
            ),
            ScriptedModel::new(),
        )
        .await;
        add_pair(h.media.path(), "ap", "100", "TITLE: Flood");

        let report = h
            .pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);

        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::MetadataExtracted);
        assert_eq!(record.title.as_deref(), Some("Flood"));
        assert_eq!(record.duration_secs, Some(125));
        assert_eq!(record.subjects, vec!["weather"]);
        assert_eq!(record.prompt_version.as_deref(), Some("t-v1"));
        assert_eq!(record.nas_path, "ap/100/clip.mp4");
        assert!(record.published_at.is_some());

        let rerun = h
            .pipeline
            .run_text_extraction(RunTrigger::Manual)
            .await
            .unwrap();
        assert_eq!(rerun.skipped, 1);
        assert_eq!(h.text_model.request_count(), 1);
    }

    #[tokio::test]
    async fn test_text_failure_is_terminal_until_manual_retry() {
        let h = harness(
            ScriptedModel::new()
                .answer("Sorry, I cannot help with {that")
                .answer(r#"{"location": "Taipei"}"#),
            ScriptedModel::new(),
        )
        .await;
        add_pair(h.media.path(), "ap", "200", "LOCATION: Taipei");

        let first = h
            .pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(first.failed, 1);
        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::TxtAnalysisFailed);
        assert!(record.last_error.is_some());

        let scheduled = h
            .pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(scheduled.skipped, 1);
        assert_eq!(h.text_model.request_count(), 1);

        let manual = h
            .pipeline
            .run_text_extraction(RunTrigger::Manual)
            .await
            .unwrap();
        assert_eq!(manual.succeeded, 1);
        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::MetadataExtracted);
        assert_eq!(record.location.as_deref(), Some("Taipei"));
        assert!(record.last_error.is_none());
    }

    #[tokio::test]
    async fn test_blank_sidecar_completes_without_model_call() {
        let h = harness(ScriptedModel::new(), ScriptedModel::new()).await;
        add_pair(h.media.path(), "ap", "300", "   \n");

        let report = h
            .pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(h.text_model.request_count(), 0);
        assert_eq!(
            only_record(&h.repo).await.analysis_status,
            AnalysisStatus::MetadataExtracted
        );
    }

    #[tokio::test]
    async fn test_unreadable_root_fails_the_run() {
        let h = harness(ScriptedModel::new(), ScriptedModel::new()).await;
        let pipeline = AnalysisPipeline::new(
            h.pipeline.store().clone(),
            Arc::new(FsMediaStorage::new("/nonexistent/media")),
            FileGroupScanner::new("/nonexistent/media"),
            TextMetadataExtractor::new(h.text_model.clone()),
            VideoContentAnalyzer::new(h.video_model.clone()),
            PromptCatalog::new(PromptsConfig::default(), "."),
        );

        assert!(matches!(
            pipeline.run_text_extraction(RunTrigger::Manual).await,
            Err(PipelineError::Scan(_))
        ));
        assert_eq!(pipeline.run(RunTrigger::Manual).await.text, None);
    }

    #[tokio::test]
    async fn test_video_stage_completes_with_fallback_prompt() {
        let h = harness(
            ScriptedModel::new().answer(r#"{"title": "Storm"}"#),
            ScriptedModel::new().answer(
                r#"{"short_summary": "Storm hits coast", "keywords": [{"term": "storm"}]}"#,
            ),
        )
        .await;
        add_pair(h.media.path(), "ap", "400", "TITLE: Storm");

        let summary = h.pipeline.run(RunTrigger::Scheduled).await;
        assert_eq!(summary.text.unwrap().succeeded, 1);
        assert_eq!(summary.video.unwrap().succeeded, 1);

        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::Completed);
        let result = h
            .repo
            .get_analysis_result(record.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.short_summary.as_deref(), Some("Storm hits coast"));
        assert_eq!(result.prompt_version.as_deref(), Some(VIDEO_FALLBACK_VERSION));
        assert!(result.error_message.is_none());
        assert!(result.created_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_video_fails_without_model_call() {
        let h = harness(
            ScriptedModel::new().answer(r#"{"title": "Gone"}"#),
            ScriptedModel::new(),
        )
        .await;
        add_pair(h.media.path(), "ap", "500", "TITLE: Gone");
        h.pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();
        std::fs::remove_file(h.media.path().join("ap/500/clip.mp4")).unwrap();

        let report = h
            .pipeline
            .run_video_analysis(RunTrigger::Scheduled, 10)
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(h.video_model.request_count(), 0);

        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::VideoAnalysisFailed);
        let result = h
            .repo
            .get_analysis_result(record.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_failed());
        assert!(result.error_message.unwrap().contains("ap/500/clip.mp4"));
    }

    #[tokio::test]
    async fn test_video_failure_retried_only_manually() {
        let h = harness(
            ScriptedModel::new().answer(r#"{"title": "Quake"}"#),
            ScriptedModel::new()
                .respond(Err(GeminiError::Api {
                    status: 500,
                    message: "internal".into(),
                }))
                .answer(r#"{"short_summary": "Quake"}"#),
        )
        .await;
        add_pair(h.media.path(), "ap", "600", "TITLE: Quake");
        h.pipeline.run(RunTrigger::Scheduled).await;

        let record = only_record(&h.repo).await;
        assert_eq!(record.analysis_status, AnalysisStatus::VideoAnalysisFailed);

        let scheduled = h
            .pipeline
            .run_video_analysis(RunTrigger::Scheduled, 10)
            .await
            .unwrap();
        assert_eq!(scheduled.processed, 0);

        let manual = h
            .pipeline
            .run_video_analysis(RunTrigger::Manual, 10)
            .await
            .unwrap();
        assert_eq!(manual.succeeded, 1);
        let result = h
            .repo
            .get_analysis_result(record.id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.short_summary.as_deref(), Some("Quake"));
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_batch_limit_is_respected() {
        let h = harness(
            ScriptedModel::new()
                .answer("{}")
                .answer("{}")
                .answer("{}"),
            ScriptedModel::new().answer(r#"{"short_summary": "a"}"#),
        )
        .await;
        for id in ["1", "2", "3"] {
            add_pair(h.media.path(), "ap", id, "text");
        }
        h.pipeline
            .run_text_extraction(RunTrigger::Scheduled)
            .await
            .unwrap();

        let report = h
            .pipeline
            .run_video_analysis(RunTrigger::Scheduled, 1)
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
        let waiting = h
            .repo
            .get_videos_by_status(&[AnalysisStatus::MetadataExtracted], 10)
            .await
            .unwrap();
        assert_eq!(waiting.len(), 2);
    }

    #[tokio::test]
    async fn test_busy_stage_rejects_trigger() {
        let h = harness(ScriptedModel::new(), ScriptedModel::new()).await;

        assert!(h.pipeline.try_begin_run(Stage::Text));
        assert!(!h.pipeline.try_begin_run(Stage::Text));
        assert_eq!(
            h.pipeline.trigger(TriggerKind::Text).err(),
            Some(TriggerError::AlreadyRunning(Stage::Text))
        );
        assert_eq!(
            h.pipeline.trigger(TriggerKind::Full).err(),
            Some(TriggerError::AlreadyRunning(Stage::Text))
        );
        // The failed full trigger must not leave the video stage held.
        assert!(!h.pipeline.is_running(Stage::Video));

        let handle = h.pipeline.trigger(TriggerKind::Video).unwrap();
        assert!(h.pipeline.is_running(Stage::Video));
        let summary = handle.await.unwrap();
        assert_eq!(summary.video, Some(StageReport::default()));
        assert!(!h.pipeline.is_running(Stage::Video));

        h.pipeline.end_run(Stage::Text);
        let summary = h.pipeline.run_scheduled().await;
        assert_eq!(summary.text, Some(StageReport::default()));
    }

    #[tokio::test]
    async fn test_scheduled_tick_skips_busy_stage() {
        let h = harness(ScriptedModel::new(), ScriptedModel::new()).await;
        assert!(h.pipeline.try_begin_run(Stage::Video));

        let summary = h.pipeline.run_scheduled().await;
        assert!(summary.text.is_some());
        assert!(summary.video.is_none());
        assert!(h.pipeline.is_running(Stage::Video));
    }
}
