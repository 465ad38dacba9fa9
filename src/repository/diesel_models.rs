//! Diesel ORM models for database tables.
//!
//! Timestamps are RFC 3339 text; list and structured fields are JSON text.

use diesel::prelude::*;

use crate::schema;

/// Video row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::videos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VideoRow {
    pub id: i64,
    pub source_name: String,
    pub source_id: String,
    pub nas_path: String,
    pub title: Option<String>,
    pub discovered_at: String,
    pub published_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub shotlist_content: Option<String>,
    pub view_link: Option<String>,
    pub subjects: String,
    pub location: Option<String>,
    pub restrictions: Option<String>,
    pub translated_restrictions: Option<String>,
    pub source_metadata: Option<String>,
    pub analysis_status: String,
    pub analyzed_at: Option<String>,
    pub prompt_version: Option<String>,
    pub last_error: Option<String>,
}

/// New video for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::videos)]
pub struct NewVideo<'a> {
    pub source_name: &'a str,
    pub source_id: &'a str,
    pub nas_path: &'a str,
    pub title: Option<&'a str>,
    pub discovered_at: &'a str,
    pub published_at: Option<&'a str>,
    pub duration_secs: Option<i64>,
    pub shotlist_content: Option<&'a str>,
    pub view_link: Option<&'a str>,
    pub subjects: &'a str,
    pub location: Option<&'a str>,
    pub restrictions: Option<&'a str>,
    pub translated_restrictions: Option<&'a str>,
    pub source_metadata: Option<&'a str>,
    pub analysis_status: &'a str,
    pub analyzed_at: Option<&'a str>,
    pub prompt_version: Option<&'a str>,
    pub last_error: Option<&'a str>,
}

/// Full overwrite of a video's mutable columns. `None` writes NULL.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::videos)]
#[diesel(treat_none_as_null = true)]
pub struct VideoChanges<'a> {
    pub title: Option<&'a str>,
    pub discovered_at: &'a str,
    pub published_at: Option<&'a str>,
    pub duration_secs: Option<i64>,
    pub shotlist_content: Option<&'a str>,
    pub view_link: Option<&'a str>,
    pub subjects: &'a str,
    pub location: Option<&'a str>,
    pub restrictions: Option<&'a str>,
    pub translated_restrictions: Option<&'a str>,
    pub source_metadata: Option<&'a str>,
    pub analysis_status: &'a str,
    pub analyzed_at: Option<&'a str>,
    pub prompt_version: Option<&'a str>,
    pub last_error: Option<&'a str>,
}

/// Analysis result row from the database.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = schema::analysis_results)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AnalysisRow {
    pub video_id: i64,
    pub transcript: Option<String>,
    pub translation: Option<String>,
    pub short_summary: Option<String>,
    pub bulleted_summary: Option<String>,
    pub visual_description: Option<String>,
    pub material_type: Option<String>,
    pub bites: Option<String>,
    pub mentioned_locations: Option<String>,
    pub importance_score: Option<String>,
    pub related_news: Option<String>,
    pub topics: Option<String>,
    pub keywords: Option<String>,
    pub error_message: Option<String>,
    pub prompt_version: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Analysis result for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::analysis_results)]
pub struct NewAnalysis {
    pub video_id: i64,
    pub transcript: Option<String>,
    pub translation: Option<String>,
    pub short_summary: Option<String>,
    pub bulleted_summary: Option<String>,
    pub visual_description: Option<String>,
    pub material_type: Option<String>,
    pub bites: Option<String>,
    pub mentioned_locations: Option<String>,
    pub importance_score: Option<String>,
    pub related_news: Option<String>,
    pub topics: Option<String>,
    pub keywords: Option<String>,
    pub error_message: Option<String>,
    pub prompt_version: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Update set applied when a result for the video already exists.
///
/// Leaves `created_at` alone; `None` clears the column.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = schema::analysis_results)]
#[diesel(treat_none_as_null = true)]
pub struct AnalysisChanges<'a> {
    pub transcript: Option<&'a str>,
    pub translation: Option<&'a str>,
    pub short_summary: Option<&'a str>,
    pub bulleted_summary: Option<&'a str>,
    pub visual_description: Option<&'a str>,
    pub material_type: Option<&'a str>,
    pub bites: Option<&'a str>,
    pub mentioned_locations: Option<&'a str>,
    pub importance_score: Option<&'a str>,
    pub related_news: Option<&'a str>,
    pub topics: Option<&'a str>,
    pub keywords: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub prompt_version: Option<&'a str>,
    pub updated_at: &'a str,
}

impl NewAnalysis {
    pub fn changes(&self) -> AnalysisChanges<'_> {
        AnalysisChanges {
            transcript: self.transcript.as_deref(),
            translation: self.translation.as_deref(),
            short_summary: self.short_summary.as_deref(),
            bulleted_summary: self.bulleted_summary.as_deref(),
            visual_description: self.visual_description.as_deref(),
            material_type: self.material_type.as_deref(),
            bites: self.bites.as_deref(),
            mentioned_locations: self.mentioned_locations.as_deref(),
            importance_score: self.importance_score.as_deref(),
            related_news: self.related_news.as_deref(),
            topics: self.topics.as_deref(),
            keywords: self.keywords.as_deref(),
            error_message: self.error_message.as_deref(),
            prompt_version: self.prompt_version.as_deref(),
            updated_at: &self.updated_at,
        }
    }
}
