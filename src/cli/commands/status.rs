//! Status and listing commands.

use console::style;

use super::helpers::open_database;
use crate::config::Settings;
use crate::models::AnalysisStatus;
use crate::repository::{SortField, SortOrder, VideoQuery, VideoStore};

/// Show record counts per analysis status.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let counts = ctx.videos().count_by_status().await?;

    println!("\n{}", style("Analysis Status").bold());
    println!("{}", "-".repeat(40));

    let mut total = 0;
    for status in AnalysisStatus::ALL {
        let count = counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        total += count;
        let label = format!("{:<24}", status.as_str());
        let label = if status.is_failed() && count > 0 {
            style(label).red().to_string()
        } else {
            label
        };
        println!("{}{:>8}", label, count);
    }
    println!("{}", "-".repeat(40));
    println!("{:<24}{:>8}", "total", total);

    Ok(())
}

/// List stored records.
pub async fn cmd_ls(
    settings: &Settings,
    limit: i64,
    offset: i64,
    search: Option<String>,
    sort_by: &str,
    asc: bool,
) -> anyhow::Result<()> {
    let ctx = open_database(settings).await?;
    let query = VideoQuery {
        limit: limit.max(1),
        offset: offset.max(0),
        search,
        sort_by: SortField::parse(sort_by),
        sort_order: if asc { SortOrder::Asc } else { SortOrder::Desc },
    };
    let (records, _) = ctx.videos().get_all_with_analysis(&query).await?;

    if records.is_empty() {
        println!("{} No records found", style("!").yellow());
        return Ok(());
    }

    for record in &records {
        println!(
            "{:>6}  {:<22}  {}",
            record.id.unwrap_or_default(),
            record.analysis_status.as_str(),
            record.label()
        );
        if let Some(ref error) = record.last_error {
            println!("        {}", style(error).dim());
        }
    }

    Ok(())
}
