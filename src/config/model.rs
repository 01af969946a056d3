//! Typed model configuration shared by the summarizer and the session store.

use crate::error::{Result, VidragError};
use serde::{Deserialize, Serialize};

/// Default chat model used for summaries and answers.
pub const DEFAULT_MODEL_NAME: &str = "gpt-5-mini";
/// Default chunk size (characters) for the vector index splitter.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap (characters) between neighbouring index chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Model name plus the chunking policy a session index is built with.
///
/// Construct through [`ModelConfig::new`] (or deserialize and call
/// [`ModelConfig::validate`]) so an invalid policy never reaches the splitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ModelConfig {
    pub fn new(model_name: impl Into<String>, chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        let config = Self {
            model_name: model_name.into(),
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the splitter relies on.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(VidragError::Config("model name must not be empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(VidragError::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(VidragError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(ModelConfig::new("gpt-4o", 100, 100).is_err());
        assert!(ModelConfig::new("gpt-4o", 100, 150).is_err());
        assert!(ModelConfig::new("gpt-4o", 100, 99).is_ok());
    }

    #[test]
    fn test_rejects_zero_size_and_blank_model() {
        assert!(ModelConfig::new("gpt-4o", 0, 0).is_err());
        assert!(ModelConfig::new("  ", 1000, 20).is_err());
    }
}
