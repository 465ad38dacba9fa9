//! HTTP adapter: manual triggers, status counts, record listing and
//! video playback from the media root.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::pipeline::AnalysisPipeline;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<AnalysisPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Start the web server.
pub async fn serve(pipeline: Arc<AnalysisPipeline>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(AppState::new(pipeline));

    tracing::info!("Starting server at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
