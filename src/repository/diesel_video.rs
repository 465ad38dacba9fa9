//! Diesel-based video repository for SQLite.
//!
//! Uses diesel-async's SyncConnectionWrapper for async SQLite support.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{AnalysisRow, NewAnalysis, NewVideo, VideoChanges, VideoRow};
use super::diesel_pool::{AsyncSqliteConnection, AsyncSqlitePool, DieselError};
use super::util::format_datetime;
use super::{
    parse_datetime, parse_datetime_opt, SortField, SortOrder, StoreError, VideoQuery, VideoStore,
};
use crate::models::{AnalysisResult, AnalysisStatus, VideoRecord};
use crate::schema::{analysis_results, videos};

impl TryFrom<VideoRow> for VideoRecord {
    type Error = StoreError;

    fn try_from(row: VideoRow) -> Result<Self, Self::Error> {
        let analysis_status =
            AnalysisStatus::from_str(&row.analysis_status).ok_or_else(|| StoreError::InvalidRow {
                id: row.id,
                reason: format!("unknown status '{}'", row.analysis_status),
            })?;

        Ok(VideoRecord {
            id: Some(row.id),
            source_name: row.source_name,
            source_id: row.source_id,
            nas_path: row.nas_path,
            title: row.title,
            discovered_at: parse_datetime(&row.discovered_at),
            published_at: parse_datetime_opt(row.published_at),
            duration_secs: row.duration_secs,
            shotlist_content: row.shotlist_content,
            view_link: row.view_link,
            subjects: serde_json::from_str(&row.subjects).unwrap_or_default(),
            location: row.location,
            restrictions: row.restrictions,
            translated_restrictions: row.translated_restrictions,
            source_metadata: row
                .source_metadata
                .and_then(|s| serde_json::from_str(&s).ok()),
            analysis_status,
            analyzed_at: parse_datetime_opt(row.analyzed_at),
            prompt_version: row.prompt_version,
            last_error: row.last_error,
        })
    }
}

fn json_column(text: Option<String>) -> Option<serde_json::Value> {
    text.and_then(|s| serde_json::from_str(&s).ok())
}

impl From<AnalysisRow> for AnalysisResult {
    fn from(row: AnalysisRow) -> Self {
        AnalysisResult {
            video_id: row.video_id,
            transcript: row.transcript,
            translation: row.translation,
            short_summary: row.short_summary,
            bulleted_summary: row.bulleted_summary,
            visual_description: row.visual_description,
            material_type: row.material_type,
            bites: json_column(row.bites),
            mentioned_locations: json_column(row.mentioned_locations),
            importance_score: json_column(row.importance_score),
            related_news: json_column(row.related_news),
            topics: json_column(row.topics),
            keywords: json_column(row.keywords),
            error_message: row.error_message,
            prompt_version: row.prompt_version,
            created_at: Some(parse_datetime(&row.created_at)),
            updated_at: Some(parse_datetime(&row.updated_at)),
        }
    }
}

/// Text forms of a record's non-text columns.
struct EncodedVideo {
    discovered_at: String,
    published_at: Option<String>,
    subjects: String,
    source_metadata: Option<String>,
    analyzed_at: Option<String>,
}

impl EncodedVideo {
    fn new(record: &VideoRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            discovered_at: format_datetime(record.discovered_at),
            published_at: record.published_at.map(format_datetime),
            subjects: serde_json::to_string(&record.subjects)?,
            source_metadata: record
                .source_metadata
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            analyzed_at: record.analyzed_at.map(format_datetime),
        })
    }

    fn insertable<'a>(&'a self, record: &'a VideoRecord) -> NewVideo<'a> {
        NewVideo {
            source_name: &record.source_name,
            source_id: &record.source_id,
            nas_path: &record.nas_path,
            title: record.title.as_deref(),
            discovered_at: &self.discovered_at,
            published_at: self.published_at.as_deref(),
            duration_secs: record.duration_secs,
            shotlist_content: record.shotlist_content.as_deref(),
            view_link: record.view_link.as_deref(),
            subjects: &self.subjects,
            location: record.location.as_deref(),
            restrictions: record.restrictions.as_deref(),
            translated_restrictions: record.translated_restrictions.as_deref(),
            source_metadata: self.source_metadata.as_deref(),
            analysis_status: record.analysis_status.as_str(),
            analyzed_at: self.analyzed_at.as_deref(),
            prompt_version: record.prompt_version.as_deref(),
            last_error: record.last_error.as_deref(),
        }
    }

    /// Full write-back of `record`. Upstream fields the record does not
    /// carry keep their stored values.
    fn changes<'a>(&'a self, record: &'a VideoRecord, stored: &'a VideoRow) -> VideoChanges<'a> {
        VideoChanges {
            title: record.title.as_deref(),
            discovered_at: &self.discovered_at,
            published_at: self.published_at.as_deref(),
            duration_secs: record.duration_secs,
            shotlist_content: record.shotlist_content.as_deref(),
            view_link: record.view_link.as_deref().or(stored.view_link.as_deref()),
            subjects: &self.subjects,
            location: record.location.as_deref(),
            restrictions: record.restrictions.as_deref(),
            translated_restrictions: record.translated_restrictions.as_deref(),
            source_metadata: self
                .source_metadata
                .as_deref()
                .or(stored.source_metadata.as_deref()),
            analysis_status: record.analysis_status.as_str(),
            analyzed_at: self.analyzed_at.as_deref(),
            prompt_version: record.prompt_version.as_deref(),
            last_error: record.last_error.as_deref(),
        }
    }
}

fn encode_analysis(result: &AnalysisResult) -> Result<NewAnalysis, serde_json::Error> {
    fn json(value: &Option<serde_json::Value>) -> Result<Option<String>, serde_json::Error> {
        value.as_ref().map(serde_json::to_string).transpose()
    }

    let now = Utc::now();
    Ok(NewAnalysis {
        video_id: result.video_id,
        transcript: result.transcript.clone(),
        translation: result.translation.clone(),
        short_summary: result.short_summary.clone(),
        bulleted_summary: result.bulleted_summary.clone(),
        visual_description: result.visual_description.clone(),
        material_type: result.material_type.clone(),
        bites: json(&result.bites)?,
        mentioned_locations: json(&result.mentioned_locations)?,
        importance_score: json(&result.importance_score)?,
        related_news: json(&result.related_news)?,
        topics: json(&result.topics)?,
        keywords: json(&result.keywords)?,
        error_message: result.error_message.clone(),
        prompt_version: result.prompt_version.clone(),
        created_at: format_datetime(result.created_at.unwrap_or(now)),
        updated_at: format_datetime(result.updated_at.unwrap_or(now)),
    })
}

/// Look a record up by its identity pair, then by path.
async fn find_by_identity(
    conn: &mut AsyncSqliteConnection,
    record: &VideoRecord,
) -> Result<Option<VideoRow>, DieselError> {
    let by_pair = videos::table
        .filter(videos::source_name.eq(&record.source_name))
        .filter(videos::source_id.eq(&record.source_id))
        .select(VideoRow::as_select())
        .first(conn)
        .await
        .optional()?;
    if by_pair.is_some() {
        return Ok(by_pair);
    }

    videos::table
        .filter(videos::nas_path.eq(&record.nas_path))
        .select(VideoRow::as_select())
        .first(conn)
        .await
        .optional()
}

/// Diesel-based video repository.
#[derive(Clone)]
pub struct DieselVideoRepository {
    pool: AsyncSqlitePool,
}

impl DieselVideoRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for DieselVideoRepository {
    async fn find_or_create_video(&self, record: &VideoRecord) -> Result<i64, StoreError> {
        let encoded = EncodedVideo::new(record)?;
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, StoreError, _>(|conn| {
            Box::pin(async move {
                let Some(row) = find_by_identity(conn, record).await? else {
                    // Lost races against a concurrent insert resolve to its row.
                    diesel::insert_or_ignore_into(videos::table)
                        .values(&encoded.insertable(record))
                        .execute(conn)
                        .await?;
                    let row = find_by_identity(conn, record).await?.ok_or_else(|| {
                        StoreError::InvalidRow {
                            id: 0,
                            reason: format!("insert of {} produced no row", record.nas_path),
                        }
                    })?;
                    return Ok(row.id);
                };

                if record.id == Some(row.id) {
                    diesel::update(videos::table.find(row.id))
                        .set(&encoded.changes(record, &row))
                        .execute(conn)
                        .await?;
                    return Ok(row.id);
                }

                let same_identity =
                    row.source_name == record.source_name && row.source_id == record.source_id;
                if same_identity && row.nas_path != record.nas_path {
                    diesel::update(videos::table.find(row.id))
                        .set(videos::nas_path.eq(&record.nas_path))
                        .execute(conn)
                        .await?;
                }
                if record.discovered_at > parse_datetime(&row.discovered_at) {
                    diesel::update(videos::table.find(row.id))
                        .set(videos::discovered_at.eq(&encoded.discovered_at))
                        .execute(conn)
                        .await?;
                }
                Ok(row.id)
            })
        })
        .await
    }

    async fn get_video_by_id(&self, id: i64) -> Result<Option<VideoRecord>, StoreError> {
        let mut conn = self.pool.get().await?;

        videos::table
            .find(id)
            .select(VideoRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(VideoRecord::try_from)
            .transpose()
    }

    async fn get_videos_by_status(
        &self,
        statuses: &[AnalysisStatus],
        limit: usize,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let names: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        let rows: Vec<VideoRow> = videos::table
            .filter(videos::analysis_status.eq_any(names))
            .order((videos::discovered_at.asc(), videos::id.asc()))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .select(VideoRow::as_select())
            .load(&mut conn)
            .await?;

        rows.into_iter().map(VideoRecord::try_from).collect()
    }

    async fn update_status(
        &self,
        id: i64,
        status: AnalysisStatus,
        analyzed_at: DateTime<Utc>,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let analyzed_at = format_datetime(analyzed_at);

        let rows = diesel::update(videos::table.find(id))
            .set((
                videos::analysis_status.eq(status.as_str()),
                videos::analyzed_at.eq(Some(&analyzed_at)),
                videos::last_error.eq(error_message),
            ))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn save_analysis_result(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        let row = encode_analysis(result)?;
        let mut conn = self.pool.get().await?;

        diesel::insert_into(analysis_results::table)
            .values(&row)
            .on_conflict(analysis_results::video_id)
            .do_update()
            .set(&row.changes())
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_analysis_result(&self, video_id: i64) -> Result<Option<AnalysisResult>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row = analysis_results::table
            .find(video_id)
            .select(AnalysisRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(row.map(AnalysisResult::from))
    }

    async fn get_all_with_analysis(
        &self,
        params: &VideoQuery,
    ) -> Result<(Vec<VideoRecord>, Vec<AnalysisResult>), StoreError> {
        let mut conn = self.pool.get().await?;

        let mut query = videos::table.select(VideoRow::as_select()).into_boxed();

        if let Some(q) = params.search.as_deref().map(str::trim) {
            if !q.is_empty() {
                let pattern = format!("%{}%", q);
                query = query.filter(
                    videos::nas_path
                        .like(pattern.clone())
                        .or(videos::source_name.like(pattern.clone()))
                        .or(videos::source_id.like(pattern.clone()))
                        .or(videos::title.like(pattern.clone()))
                        .or(videos::location.like(pattern)),
                );
            }
        }

        let desc = params.sort_order == SortOrder::Desc;
        query = match params.sort_by {
            SortField::DiscoveredAt if desc => query.order(videos::discovered_at.desc()),
            SortField::DiscoveredAt => query.order(videos::discovered_at.asc()),
            SortField::PublishedAt if desc => query.order(videos::published_at.desc()),
            SortField::PublishedAt => query.order(videos::published_at.asc()),
            SortField::AnalyzedAt if desc => query.order(videos::analyzed_at.desc()),
            SortField::AnalyzedAt => query.order(videos::analyzed_at.asc()),
            SortField::Title if desc => query.order(videos::title.desc()),
            SortField::Title => query.order(videos::title.asc()),
            SortField::Duration if desc => query.order(videos::duration_secs.desc()),
            SortField::Duration => query.order(videos::duration_secs.asc()),
            SortField::Id if desc => query.order(videos::id.desc()),
            SortField::Id => query.order(videos::id.asc()),
        };
        // Stable paging when the sort column has ties.
        query = if desc {
            query.then_order_by(videos::id.desc())
        } else {
            query.then_order_by(videos::id.asc())
        };

        let rows: Vec<VideoRow> = query
            .limit(params.limit.max(0))
            .offset(params.offset.max(0))
            .load(&mut conn)
            .await?;
        let records = rows
            .into_iter()
            .map(VideoRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<i64> = records.iter().filter_map(|r| r.id).collect();
        if ids.is_empty() {
            return Ok((records, Vec::new()));
        }

        let results: Vec<AnalysisRow> = analysis_results::table
            .filter(analysis_results::video_id.eq_any(ids))
            .select(AnalysisRow::as_select())
            .load(&mut conn)
            .await?;

        Ok((records, results.into_iter().map(AnalysisResult::from).collect()))
    }

    async fn count_by_status(&self) -> Result<Vec<(AnalysisStatus, i64)>, StoreError> {
        use diesel::dsl::count_star;

        let mut conn = self.pool.get().await?;

        let rows: Vec<(String, i64)> = videos::table
            .group_by(videos::analysis_status)
            .select((videos::analysis_status, count_star()))
            .load(&mut conn)
            .await?;

        let mut counts: Vec<(AnalysisStatus, i64)> = rows
            .into_iter()
            .filter_map(|(name, n)| AnalysisStatus::from_str(&name).map(|s| (s, n)))
            .collect();
        counts.sort_by_key(|(status, _)| {
            AnalysisStatus::ALL
                .iter()
                .position(|s| s == status)
                .unwrap_or(usize::MAX)
        });
        Ok(counts)
    }
}
