//! footage - two-stage AI analysis pipeline for paired media assets.
//!
//! Stage 1 reads each item's sidecar text and extracts descriptive
//! metadata; stage 2 sends the video itself to a multimodal model. Both
//! stages are driven by a persisted status state machine so work is never
//! repeated and a failed item never blocks the rest of a batch.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod gemini;
pub mod models;
pub mod pipeline;
pub mod repository;
pub mod scanner;
pub mod scheduler;
pub mod schema;
pub mod server;
pub mod storage;
