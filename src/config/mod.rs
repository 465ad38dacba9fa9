//! Configuration management using the prefer crate for file discovery.
//!
//! [`Config`] mirrors the config file; [`Settings`] holds the resolved
//! paths a command actually runs with.

mod prompts;

pub use prompts::{
    PromptCatalog, PromptKind, PromptSetConfig, PromptSource, PromptsConfig, ResolvedPrompt,
    TEXT_FALLBACK_VERSION, TEXT_VERSION_NOT_FOUND, VIDEO_FALLBACK_VERSION, VIDEO_VERSION_NOT_FOUND,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gemini::DEFAULT_MODEL;
use crate::repository::DieselDbContext;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "footage.db";

/// Environment variables that override file configuration.
pub const ENV_DATABASE_URL: &str = "FOOTAGE_DATABASE_URL";
pub const ENV_MEDIA_ROOT: &str = "FOOTAGE_MEDIA_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Root of the scanned media tree; stored paths are relative to it.
    pub media_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("footage");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            media_root: PathBuf::from("media"),
        }
    }
}

impl Settings {
    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })
    }

    pub fn create_db_context(&self) -> DieselDbContext {
        DieselDbContext::from_url(&self.database_url())
    }

    /// Apply environment overrides. `lookup` is `std::env::var` outside tests.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_DATABASE_URL) {
            tracing::debug!("Using {} from environment: {}", ENV_DATABASE_URL, url);
            self.database_url = Some(url);
        }
        if let Some(root) = non_empty(ENV_MEDIA_ROOT) {
            tracing::debug!("Using {} from environment: {}", ENV_MEDIA_ROOT, root);
            self.media_root = PathBuf::from(shellexpand::tilde(&root).as_ref());
        }
    }
}

/// AI model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_model")]
    pub text_model: String,
    #[serde(default = "default_model")]
    pub video_model: String,
    /// API key; `GEMINI_API_KEY` is used when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            text_model: default_model(),
            video_model: default_model(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum records analyzed per stage-2 run.
    #[serde(default = "default_video_batch_limit")]
    pub video_batch_limit: usize,
    #[serde(default = "default_text_timeout_secs")]
    pub text_timeout_secs: u64,
    #[serde(default = "default_video_timeout_secs")]
    pub video_timeout_secs: u64,
}

fn default_video_batch_limit() -> usize {
    10
}

fn default_text_timeout_secs() -> u64 {
    180
}

fn default_video_timeout_secs() -> u64 {
    20 * 60
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_batch_limit: default_video_batch_limit(),
            text_timeout_secs: default_text_timeout_secs(),
            video_timeout_secs: default_video_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn text_timeout(&self) -> Duration {
        Duration::from_secs(self.text_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3030".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Media root directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_root: Option<String>,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// A discovered file that fails to parse is logged and replaced by
    /// defaults; an explicit path goes through [`Config::load_from_path`].
    pub async fn load() -> Self {
        let discovered = match prefer::load("footage").await {
            Ok(pref_config) => pref_config.source_path().map(|p| p.to_path_buf()),
            Err(_) => None,
        };

        let Some(path) = discovered else {
            tracing::debug!("No config file found, using defaults");
            return Self::default();
        };

        match Self::load_from_path(&path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            _ => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory that relative paths in this config resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolve a path that may be relative to the config file.
    /// Paths starting with `~` are expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref media_root) = self.media_root {
            settings.media_root = self.resolve_path(media_root, base_dir);
        } else {
            settings.media_root = base_dir.join(&settings.media_root);
        }
    }

    pub fn prompt_catalog(&self) -> PromptCatalog {
        PromptCatalog::new(self.prompts.clone(), self.base_dir())
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load settings with explicit options.
///
/// Precedence: environment, then config file, then defaults.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &config.base_dir());
    settings.apply_env(|key| std::env::var(key).ok());
    config.prompt_catalog().check();

    Ok((settings, config))
}
