//! Access to media files under the configured media root.
//!
//! Records store paths relative to the root; the pipeline resolves them
//! here just before handing a video to the analyzer.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    Missing(String),
    #[error("path escapes media root: {0}")]
    InvalidPath(String),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves stored relative paths to readable files.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Absolute path of an existing file. Missing files are an error.
    async fn resolve_absolute_path(&self, relative: &str) -> Result<PathBuf, StorageError>;

    async fn read_bytes(&self, relative: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve_absolute_path(relative).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| StorageError::Io { path, source })
    }
}

/// Media storage on the local (or NAS-mounted) filesystem.
#[derive(Debug, Clone)]
pub struct FsMediaStorage {
    root: PathBuf,
}

impl FsMediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a `/`-separated relative path onto the root, refusing anything
    /// that could leave it.
    fn join(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(relative);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.is_empty() || escapes {
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl MediaStorage for FsMediaStorage {
    async fn resolve_absolute_path(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let path = self.join(relative)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(StorageError::Missing(relative.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(relative.to_string()))
            }
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
