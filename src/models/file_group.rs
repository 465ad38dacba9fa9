//! Transient pairing of a video file with its sidecar text.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// One video file and its sidecar `.txt` found in the same leaf directory.
///
/// Produced fresh on every scan and never persisted; `relative_path` is the
/// durable key stored on the owning [`VideoRecord`](super::VideoRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub video_path: PathBuf,
    pub sidecar_path: PathBuf,
    /// First-level directory name under the media root.
    pub source_name: String,
    /// Second-level directory name under the source directory.
    pub source_id: String,
    /// Video path relative to the media root, `/`-separated.
    pub relative_path: String,
    pub modified_at: DateTime<Utc>,
}

impl FileGroup {
    /// File name of the video, for log output.
    pub fn video_file_name(&self) -> String {
        self.video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
