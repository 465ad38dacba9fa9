//! Initialize command.

use console::style;

use super::helpers::open_database;
use crate::config::{Config, PromptKind, Settings};

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    open_database(settings).await?;

    if !settings.media_root.is_dir() {
        println!(
            "{} Media root {} does not exist yet",
            style("!").yellow(),
            settings.media_root.display()
        );
    }

    let catalog = config.prompt_catalog();
    for (kind, name) in [(PromptKind::Text, "Text"), (PromptKind::Video, "Video")] {
        let prompt = catalog.resolve(kind).await;
        if prompt.is_fallback {
            println!(
                "{} {} prompt not configured, using built-in {}",
                style("!").yellow(),
                name,
                prompt.version
            );
        } else {
            println!("  {} {} prompt: {}", style("✓").green(), name, prompt.version);
        }
    }

    println!(
        "{} Initialized footage in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
