//! Diesel database context: connection factory plus repository access.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::diesel_pool::{AsyncSqlitePool, DieselError};
use super::diesel_video::DieselVideoRepository;

/// DDL for every table. Idempotent; kept in sync with `crate::schema`.
pub const SCHEMA_SQL: &str = r#"
-- One row per discovered media item
CREATE TABLE IF NOT EXISTS videos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_name TEXT NOT NULL,
    source_id TEXT NOT NULL,
    nas_path TEXT NOT NULL UNIQUE,
    title TEXT,
    discovered_at TEXT NOT NULL,
    published_at TEXT,
    duration_secs INTEGER,
    shotlist_content TEXT,
    view_link TEXT,
    subjects TEXT NOT NULL DEFAULT '[]',
    location TEXT,
    restrictions TEXT,
    translated_restrictions TEXT,
    source_metadata TEXT,
    analysis_status TEXT NOT NULL DEFAULT 'pending',
    analyzed_at TEXT,
    prompt_version TEXT,
    last_error TEXT,
    UNIQUE(source_name, source_id)
);

CREATE INDEX IF NOT EXISTS idx_videos_status_discovered
    ON videos(analysis_status, discovered_at);

-- One row per video, written by the multimodal stage
CREATE TABLE IF NOT EXISTS analysis_results (
    video_id INTEGER PRIMARY KEY REFERENCES videos(id) ON DELETE CASCADE,
    transcript TEXT,
    translation TEXT,
    short_summary TEXT,
    bulleted_summary TEXT,
    visual_description TEXT,
    material_type TEXT,
    bites TEXT,
    mentioned_locations TEXT,
    importance_score TEXT,
    related_news TEXT,
    topics TEXT,
    keywords TEXT,
    error_message TEXT,
    prompt_version TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Database context. Create one per command or service and hand out
/// repositories from it.
///
/// # Example
/// ```ignore
/// let ctx = DieselDbContext::from_sqlite_path(&db_path);
/// ctx.init_schema().await?;
/// let pending = ctx.videos().get_videos_by_status(&[AnalysisStatus::Pending], 10).await?;
/// ```
#[derive(Clone)]
pub struct DieselDbContext {
    pool: AsyncSqlitePool,
}

impl DieselDbContext {
    /// Create a context from a SQLite file path.
    pub fn from_sqlite_path(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a database URL (`sqlite:path` or a plain path).
    pub fn from_url(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    /// Get a video repository.
    pub fn videos(&self) -> DieselVideoRepository {
        DieselVideoRepository::new(self.pool.clone())
    }

    /// Create tables and indexes if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await
    }
}
