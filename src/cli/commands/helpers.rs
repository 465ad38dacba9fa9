//! Shared helper functions for CLI commands.

use std::sync::Arc;

use console::style;

use crate::config::{Config, Settings};
use crate::pipeline::{AnalysisPipeline, RunSummary, StageReport};
use crate::repository::DieselDbContext;

/// Open the database, creating the schema if needed.
pub async fn open_database(settings: &Settings) -> anyhow::Result<DieselDbContext> {
    settings.ensure_directories()?;
    let ctx = settings.create_db_context();
    ctx.init_schema().await?;
    Ok(ctx)
}

/// Build the production pipeline, optionally overriding the video batch size.
pub async fn open_pipeline(
    settings: &Settings,
    config: &Config,
    video_limit: Option<usize>,
) -> anyhow::Result<Arc<AnalysisPipeline>> {
    let ctx = open_database(settings).await?;
    let mut pipeline = AnalysisPipeline::from_config(settings, config, Arc::new(ctx.videos()));
    if let Some(limit) = video_limit {
        pipeline = pipeline.with_video_batch_limit(limit);
    }
    Ok(Arc::new(pipeline))
}

fn print_stage(name: &str, report: Option<StageReport>) -> bool {
    match report {
        Some(report) if report.failed == 0 => {
            println!("{} {}: {}", style("✓").green(), name, report);
            true
        }
        Some(report) => {
            println!("{} {}: {}", style("!").yellow(), name, report);
            true
        }
        None => {
            println!("{} {} did not complete (see log)", style("✗").red(), name);
            false
        }
    }
}

/// Print the stages that ran. Errors when a stage that ran did not finish.
pub fn print_summary(summary: &RunSummary, text_ran: bool, video_ran: bool) -> anyhow::Result<()> {
    let mut ok = true;
    if text_ran {
        ok &= print_stage("Text analysis", summary.text);
    }
    if video_ran {
        ok &= print_stage("Video analysis", summary.video);
    }
    if ok {
        Ok(())
    } else {
        anyhow::bail!("analysis run did not complete")
    }
}
