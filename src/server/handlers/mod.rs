//! HTTP request handlers for the web server.

mod api;
mod media;
mod trigger;

pub use api::{api_status, api_videos, health};
pub use media::media_file;
pub use trigger::{trigger_analysis, trigger_text_analysis, trigger_video_analysis};

#[cfg(test)]
mod tests;
