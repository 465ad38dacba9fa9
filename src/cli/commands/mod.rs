//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod helpers;
mod init;
mod pipeline;
mod scan;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "footage")]
#[command(about = "Two-stage AI analysis of video files and their sidecar texts")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// List the video/sidecar pairs under the media root (read-only)
    Scan,

    /// Run text metadata extraction (stage 1), retrying failed items
    Extract,

    /// Run video content analysis (stage 2), retrying failed items
    Analyze {
        /// Maximum number of videos to analyze (default: from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Run both stages in order
    Run {
        /// Maximum number of videos to analyze (default: from config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show record counts per analysis status
    Status,

    /// List stored records
    Ls {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
        /// Skip this many records
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Filter by path, source, title or location
        #[arg(short, long)]
        search: Option<String>,
        /// Sort column (discovered_at, published_at, analyzed_at, title, duration, id)
        #[arg(long, default_value = "discovered_at")]
        sort_by: String,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },

    /// Start the HTTP server and the periodic scheduler
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
        /// Do not start the scheduler
        #[arg(long)]
        no_scheduler: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Scan => scan::cmd_scan(&settings),
        Commands::Extract => pipeline::cmd_extract(&settings, &config).await,
        Commands::Analyze { limit } => pipeline::cmd_analyze(&settings, &config, limit).await,
        Commands::Run { limit } => pipeline::cmd_run(&settings, &config, limit).await,
        Commands::Status => status::cmd_status(&settings).await,
        Commands::Ls {
            limit,
            offset,
            search,
            sort_by,
            asc,
        } => status::cmd_ls(&settings, limit, offset, search, &sort_by, asc).await,
        Commands::Serve { bind, no_scheduler } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            serve::cmd_serve(&settings, &config, &bind, no_scheduler).await
        }
    }
}
