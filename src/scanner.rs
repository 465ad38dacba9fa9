//! Media root scanner pairing videos with their sidecar text files.
//!
//! Expected layout:
//!
//! ```text
//! {root}/{source_name}/{source_id}/clip.mp4
//! {root}/{source_name}/{source_id}/clip.txt
//! ```
//!
//! Anomalies (a leaf directory with only one of the two files, more than
//! one candidate of a kind, unreadable subdirectories) are reported as
//! warnings and never fail the scan.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::FileGroup;

/// Video extensions recognized during pairing (lowercase, without dot).
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "mov", "avi", "mkv", "ts", "flv", "wmv"];

const SIDECAR_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot read media root {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Pairing anomaly found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    MissingVideo { dir: PathBuf },
    MissingSidecar { dir: PathBuf },
    ExtraVideo { dir: PathBuf, ignored: PathBuf },
    ExtraSidecar { dir: PathBuf, ignored: PathBuf },
    UnreadableDir { dir: PathBuf, reason: String },
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingVideo { dir } => {
                write!(f, "{}: sidecar text found but no video file", dir.display())
            }
            Self::MissingSidecar { dir } => {
                write!(f, "{}: video file found but no sidecar text", dir.display())
            }
            Self::ExtraVideo { dir, ignored } => write!(
                f,
                "{}: multiple video files, ignoring {}",
                dir.display(),
                ignored.display()
            ),
            Self::ExtraSidecar { dir, ignored } => write!(
                f,
                "{}: multiple sidecar files, ignoring {}",
                dir.display(),
                ignored.display()
            ),
            Self::UnreadableDir { dir, reason } => {
                write!(f, "{}: unreadable directory ({})", dir.display(), reason)
            }
        }
    }
}

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub groups: Vec<FileGroup>,
    pub warnings: Vec<ScanWarning>,
}

impl ScanReport {
    fn warn(&mut self, warning: ScanWarning) {
        warn!("Scan: {}", warning);
        self.warnings.push(warning);
    }
}

/// Walks the media root two levels deep and pairs files per leaf directory.
#[derive(Debug, Clone)]
pub struct FileGroupScanner {
    root: PathBuf,
}

impl FileGroupScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the media root.
    ///
    /// Only an unreadable root is an error. Output order follows the
    /// directory listing order of the filesystem.
    pub fn scan(&self) -> Result<ScanReport, ScanError> {
        let unreadable = |source| ScanError::UnreadableRoot {
            path: self.root.clone(),
            source,
        };
        let root = fs::canonicalize(&self.root).map_err(unreadable)?;
        let sources = fs::read_dir(&root).map_err(unreadable)?;

        let mut report = ScanReport::default();

        for source_dir in subdirectories(sources, &root, &mut report) {
            let source_name = dir_name(&source_dir);
            let entries = match fs::read_dir(&source_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    report.warn(ScanWarning::UnreadableDir {
                        dir: source_dir,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            for item_dir in subdirectories(entries, &source_dir, &mut report) {
                let source_id = dir_name(&item_dir);
                if let Some(group) = pair_leaf(&root, &item_dir, &source_name, &source_id, &mut report) {
                    report.groups.push(group);
                }
            }
        }

        info!(
            "Scan of {} found {} pairs ({} warnings)",
            root.display(),
            report.groups.len(),
            report.warnings.len()
        );
        Ok(report)
    }
}

fn subdirectories(entries: fs::ReadDir, parent: &Path, report: &mut ScanReport) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    dirs.push(entry.path());
                }
            }
            Err(e) => report.warn(ScanWarning::UnreadableDir {
                dir: parent.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
    dirs
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub fn is_video_file(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn pair_leaf(
    root: &Path,
    dir: &Path,
    source_name: &str,
    source_id: &str,
    report: &mut ScanReport,
) -> Option<FileGroup> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            report.warn(ScanWarning::UnreadableDir {
                dir: dir.to_path_buf(),
                reason: e.to_string(),
            });
            return None;
        }
    };

    let mut video: Option<(PathBuf, DateTime<Utc>)> = None;
    let mut sidecar: Option<PathBuf> = None;

    for entry in entries.flatten() {
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        if is_video_file(&path) {
            if video.is_some() {
                report.warn(ScanWarning::ExtraVideo {
                    dir: dir.to_path_buf(),
                    ignored: path,
                });
                continue;
            }
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            video = Some((path, modified));
        } else if lowercase_extension(&path).as_deref() == Some(SIDECAR_EXTENSION) {
            if sidecar.is_some() {
                report.warn(ScanWarning::ExtraSidecar {
                    dir: dir.to_path_buf(),
                    ignored: path,
                });
                continue;
            }
            sidecar = Some(path);
        }
    }

    match (video, sidecar) {
        (Some((video_path, modified_at)), Some(sidecar_path)) => {
            let relative_path = relative_to(root, &video_path)?;
            Some(FileGroup {
                video_path,
                sidecar_path,
                source_name: source_name.to_string(),
                source_id: source_id.to_string(),
                relative_path,
                modified_at,
            })
        }
        (None, Some(_)) => {
            report.warn(ScanWarning::MissingVideo {
                dir: dir.to_path_buf(),
            });
            None
        }
        (Some(_), None) => {
            report.warn(ScanWarning::MissingSidecar {
                dir: dir.to_path_buf(),
            });
            None
        }
        (None, None) => None,
    }
}

/// `/`-separated path of `path` relative to `root`.
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
