//! Versioned prompt configuration for both analysis stages.
//!
//! A stage's prompt is looked up by its `current_version`. Anything that
//! goes wrong on the way (unknown version, unreadable file, blank text)
//! degrades to a built-in prompt tagged with a fallback version, so a
//! broken prompt setup never stops the pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configured `current_version` when none is set for the text stage.
pub const TEXT_VERSION_NOT_FOUND: &str = "default-t-not-found";
/// Configured `current_version` when none is set for the video stage.
pub const VIDEO_VERSION_NOT_FOUND: &str = "default-v-not-found";

pub const TEXT_FALLBACK_VERSION: &str = "default-text-fallback-v0";
pub const VIDEO_FALLBACK_VERSION: &str = "default-video-fallback-v0";

const TEXT_FALLBACK_PROMPT: &str = "請從以下影片說明文字中擷取元數據，並以 JSON 物件回傳，欄位包含 title、creation_date、duration_seconds、subjects、location、shotlist_content、restrictions、translated_restrictions。";
const VIDEO_FALLBACK_PROMPT: &str = "請分析此影片的音視覺內容，提供短摘要、列點摘要、BITE、影片中提及的地點、重要性評分、關鍵詞、影片內容的分類和素材類型。";

/// Where a prompt version's text lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptSource {
    /// Path to a template file; relative paths resolve against the config
    /// file's directory.
    File { file: String },
    Inline { text: String },
}

/// Prompt versions for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptSetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub versions: HashMap<String, PromptSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default)]
    pub text_analysis: PromptSetConfig,
    #[serde(default)]
    pub video_analysis: PromptSetConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Text,
    Video,
}

impl PromptKind {
    fn unset_version(self) -> &'static str {
        match self {
            Self::Text => TEXT_VERSION_NOT_FOUND,
            Self::Video => VIDEO_VERSION_NOT_FOUND,
        }
    }

    fn fallback(self) -> ResolvedPrompt {
        let (version, text) = match self {
            Self::Text => (TEXT_FALLBACK_VERSION, TEXT_FALLBACK_PROMPT),
            Self::Video => (VIDEO_FALLBACK_VERSION, VIDEO_FALLBACK_PROMPT),
        };
        ResolvedPrompt {
            version: version.to_string(),
            text: text.to_string(),
            is_fallback: true,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Text => "text_analysis",
            Self::Video => "video_analysis",
        }
    }
}

/// A prompt ready to send, tagged with the version recorded on results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    pub version: String,
    pub text: String,
    pub is_fallback: bool,
}

/// Resolves prompt versions at run time.
///
/// Files are re-read on every resolution so edits take effect on the next
/// run without a restart.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    prompts: PromptsConfig,
    base_dir: PathBuf,
}

impl PromptCatalog {
    pub fn new(prompts: PromptsConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts,
            base_dir: base_dir.into(),
        }
    }

    fn set(&self, kind: PromptKind) -> &PromptSetConfig {
        match kind {
            PromptKind::Text => &self.prompts.text_analysis,
            PromptKind::Video => &self.prompts.video_analysis,
        }
    }

    fn file_path(&self, file: &str) -> PathBuf {
        let expanded = shellexpand::tilde(file);
        let path = Path::new(expanded.as_ref());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub async fn resolve(&self, kind: PromptKind) -> ResolvedPrompt {
        let set = self.set(kind);
        let version = set
            .current_version
            .as_deref()
            .unwrap_or(kind.unset_version());

        let Some(source) = set.versions.get(version) else {
            warn!(
                "Prompt version '{}' for {} not configured, using built-in prompt",
                version,
                kind.label()
            );
            return kind.fallback();
        };

        let text = match source {
            PromptSource::Inline { text } => text.clone(),
            PromptSource::File { file } => {
                let path = self.file_path(file);
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            "Cannot read {} prompt '{}' from {}: {}, using built-in prompt",
                            kind.label(),
                            version,
                            path.display(),
                            e
                        );
                        return kind.fallback();
                    }
                }
            }
        };

        if text.trim().is_empty() {
            warn!(
                "Prompt version '{}' for {} is blank, using built-in prompt",
                version,
                kind.label()
            );
            return kind.fallback();
        }

        debug!("Using {} prompt version {}", kind.label(), version);
        ResolvedPrompt {
            version: version.to_string(),
            text,
            is_fallback: false,
        }
    }

    /// Log configuration problems that would otherwise only show up as
    /// fallback prompts at run time.
    pub fn check(&self) {
        for kind in [PromptKind::Text, PromptKind::Video] {
            let set = self.set(kind);
            match set.current_version.as_deref() {
                None => warn!("No current_version set for {} prompts", kind.label()),
                Some(v) if !set.versions.contains_key(v) => warn!(
                    "current_version '{}' for {} prompts has no matching entry in versions",
                    v,
                    kind.label()
                ),
                Some(_) => {}
            }
        }
    }
}
