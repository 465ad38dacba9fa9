//! Manual analysis runs.
//!
//! These go through the same trigger path as the HTTP server, so failed
//! items are retried and a busy stage is refused.

use console::style;

use super::helpers::{open_pipeline, print_summary};
use crate::config::{Config, Settings};
use crate::pipeline::TriggerKind;

async fn run_kind(
    settings: &Settings,
    config: &Config,
    kind: TriggerKind,
    video_limit: Option<usize>,
) -> anyhow::Result<()> {
    let pipeline = open_pipeline(settings, config, video_limit).await?;
    println!(
        "{} Media root: {}",
        style("→").cyan(),
        pipeline.media_root().display()
    );

    let summary = pipeline.trigger(kind)?.await?;
    let (text, video) = match kind {
        TriggerKind::Text => (true, false),
        TriggerKind::Video => (false, true),
        TriggerKind::Full => (true, true),
    };
    print_summary(&summary, text, video)
}

pub async fn cmd_extract(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    run_kind(settings, config, TriggerKind::Text, None).await
}

pub async fn cmd_analyze(
    settings: &Settings,
    config: &Config,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    run_kind(settings, config, TriggerKind::Video, limit).await
}

pub async fn cmd_run(settings: &Settings, config: &Config, limit: Option<usize>) -> anyhow::Result<()> {
    run_kind(settings, config, TriggerKind::Full, limit).await
}
