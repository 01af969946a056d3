//! Configuration settings for vidrag.

use super::model::{ModelConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MODEL_NAME};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub acquisition: AcquisitionSettings,
    pub embedding: EmbeddingSettings,
    pub sessions: SessionSettings,
    pub language: Language,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Directory for temporary files (subtitle and audio downloads).
    pub temp_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.vidrag".to_string(),
            temp_dir: "/tmp/vidrag".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Chat model and index chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Chat model used for summaries and answers.
    pub model_name: String,
    /// Index chunk size in characters.
    pub chunk_size: usize,
    /// Index chunk overlap in characters.
    pub chunk_overlap: usize,
    /// Sampling temperature for generation calls.
    pub temperature: f32,
    /// Completion token cap per generation call.
    pub max_completion_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            temperature: 1.0,
            max_completion_tokens: 2048,
        }
    }
}

/// Subtitle and audio acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    /// Subtitle languages in preference order.
    pub subtitle_languages: Vec<String>,
    /// yt-dlp subtitle format selector.
    pub subtitle_format: String,
    /// yt-dlp audio format selector.
    pub audio_format: String,
    /// Fall back to audio transcription when no subtitles exist.
    pub allow_transcription: bool,
    /// Speech-to-text model.
    pub transcription_model: String,
    /// yt-dlp executable.
    pub ytdlp_path: String,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            subtitle_languages: crate::acquisition::DEFAULT_SUBTITLE_LANGUAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            subtitle_format: "vtt/srt/best".to_string(),
            audio_format: "bestaudio[ext=m4a]/bestaudio/best".to_string(),
            allow_transcription: true,
            transcription_model: "whisper-1".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Root directory holding one sub-directory per session.
    pub dir: String,
    /// Number of chunks a retriever returns per query.
    pub retriever_top_k: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            dir: "~/.vidrag/sessions".to_string(),
            retriever_top_k: 4,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        // Fail at startup rather than on the first index build.
        settings.model_config()?;
        Ok(settings)
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::VidragError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidrag")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded sessions root.
    pub fn sessions_dir(&self) -> PathBuf {
        Self::expand_path(&self.sessions.dir)
    }

    /// The validated model configuration.
    pub fn model_config(&self) -> crate::error::Result<ModelConfig> {
        ModelConfig::new(
            self.model.model_name.clone(),
            self.model.chunk_size,
            self.model.chunk_overlap,
        )
    }
}
