//! Output language for summaries.

use serde::{Deserialize, Serialize};

/// Language a summary is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Simplified Chinese.
    #[default]
    Zh,
    En,
}

impl Language {
    /// Parse a language code; anything other than `zh` falls back to English.
    pub fn normalize(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "zh" => Language::Zh,
            _ => Language::En,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }

    /// Human-readable name used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Language::Zh => "Simplified Chinese",
            Language::En => "English",
        }
    }

    /// Closing reminder appended to every summary prompt.
    pub fn reminder(&self) -> &'static str {
        match self {
            Language::Zh => "请用简体中文回答。",
            Language::En => "Please respond in English.",
        }
    }

    /// Instruction placed in the analysis report prompt.
    pub fn analysis_instruction(&self) -> &'static str {
        match self {
            Language::Zh => "请使用简体中文撰写分析。",
            Language::En => "Please write the analysis in English.",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            _ => Err(format!("Unknown language: {} (expected zh or en)", s)),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
