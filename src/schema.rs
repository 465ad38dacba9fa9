// Diesel table definitions. Kept in sync with the DDL in
// `repository::diesel_context::SCHEMA_SQL`.

diesel::table! {
    videos (id) {
        id -> BigInt,
        source_name -> Text,
        source_id -> Text,
        nas_path -> Text,
        title -> Nullable<Text>,
        discovered_at -> Text,
        published_at -> Nullable<Text>,
        duration_secs -> Nullable<BigInt>,
        shotlist_content -> Nullable<Text>,
        view_link -> Nullable<Text>,
        subjects -> Text,
        location -> Nullable<Text>,
        restrictions -> Nullable<Text>,
        translated_restrictions -> Nullable<Text>,
        source_metadata -> Nullable<Text>,
        analysis_status -> Text,
        analyzed_at -> Nullable<Text>,
        prompt_version -> Nullable<Text>,
        last_error -> Nullable<Text>,
    }
}

diesel::table! {
    analysis_results (video_id) {
        video_id -> BigInt,
        transcript -> Nullable<Text>,
        translation -> Nullable<Text>,
        short_summary -> Nullable<Text>,
        bulleted_summary -> Nullable<Text>,
        visual_description -> Nullable<Text>,
        material_type -> Nullable<Text>,
        bites -> Nullable<Text>,
        mentioned_locations -> Nullable<Text>,
        importance_score -> Nullable<Text>,
        related_news -> Nullable<Text>,
        topics -> Nullable<Text>,
        keywords -> Nullable<Text>,
        error_message -> Nullable<Text>,
        prompt_version -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::joinable!(analysis_results -> videos (video_id));

diesel::allow_tables_to_appear_in_same_query!(videos, analysis_results,);
