//! Media root scan command.

use console::style;

use crate::config::Settings;
use crate::scanner::FileGroupScanner;

/// List the pairs a scan finds, without touching the database.
pub fn cmd_scan(settings: &Settings) -> anyhow::Result<()> {
    let report = FileGroupScanner::new(&settings.media_root).scan()?;

    for group in &report.groups {
        println!(
            "  {} {}/{}  {}",
            style("•").cyan(),
            group.source_name,
            group.source_id,
            group.relative_path
        );
    }
    for warning in &report.warnings {
        println!("  {} {}", style("!").yellow(), warning);
    }

    println!(
        "{} {} pairs under {} ({} warnings)",
        style("✓").green(),
        report.groups.len(),
        settings.media_root.display(),
        report.warnings.len()
    );
    Ok(())
}
