//! footage - two-stage AI analysis of paired video and sidecar text assets.
//!
//! Scans a media root for video files with their descriptive `.txt`
//! sidecars, extracts structured metadata from the text, then annotates
//! the video itself with a multimodal model.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if footage::cli::is_verbose() {
        "footage=info"
    } else {
        "footage=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    footage::cli::run().await
}
