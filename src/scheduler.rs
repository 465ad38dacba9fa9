//! Periodic driver for scheduled pipeline runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use crate::pipeline::AnalysisPipeline;

/// Runs [`AnalysisPipeline::run_scheduled`] every `period`.
///
/// The first run happens one full period after start. A tick that comes
/// due while a run is still going is delayed, not queued up.
pub struct Scheduler {
    pipeline: Arc<AnalysisPipeline>,
    period: Duration,
}

impl Scheduler {
    pub fn new(pipeline: Arc<AnalysisPipeline>, period: Duration) -> Self {
        Self { pipeline, period }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!("Scheduler started (every {}s)", self.period.as_secs());
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            info!("Scheduled analysis run starting");
            let summary = self.pipeline.run_scheduled().await;
            if let Some(text) = summary.text {
                info!("Scheduled text analysis: {}", text);
            }
            if let Some(video) = summary.video {
                info!("Scheduled video analysis: {}", video);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::ScriptedModel;
    use crate::analysis::{TextMetadataExtractor, VideoContentAnalyzer};
    use crate::config::{PromptCatalog, PromptsConfig};
    use crate::models::AnalysisStatus;
    use crate::repository::{DieselDbContext, VideoStore};
    use crate::scanner::FileGroupScanner;
    use crate::storage::FsMediaStorage;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_runs_after_first_period() {
        let db = tempdir().unwrap();
        let media = tempdir().unwrap();
        let dir = media.path().join("ap/1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("clip.mp4"), b"video").unwrap();
        std::fs::write(dir.join("clip.txt"), "text").unwrap();

        let ctx = DieselDbContext::from_sqlite_path(&db.path().join("test.db"));
        ctx.init_schema().await.unwrap();
        let repo = ctx.videos();
        let model = Arc::new(ScriptedModel::new().answer("{}"));
        let pipeline = Arc::new(AnalysisPipeline::new(
            Arc::new(repo.clone()),
            Arc::new(FsMediaStorage::new(media.path())),
            FileGroupScanner::new(media.path()),
            TextMetadataExtractor::new(model.clone()),
            VideoContentAnalyzer::new(Arc::new(ScriptedModel::new())),
            PromptCatalog::new(PromptsConfig::default(), media.path()),
        ));

        let handle = Scheduler::new(pipeline, Duration::from_millis(50)).spawn();
        assert_eq!(model.request_count(), 0);

        let mut extracted = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let counts = repo.count_by_status().await.unwrap();
            let settled = counts.iter().any(|(status, _)| {
                !matches!(
                    status,
                    AnalysisStatus::Pending | AnalysisStatus::MetadataExtracting
                )
            });
            if settled {
                extracted = true;
                break;
            }
        }
        handle.abort();

        assert!(extracted);
        // Later ticks find the record settled and do not call the text model again.
        assert_eq!(model.request_count(), 1);
    }
}
