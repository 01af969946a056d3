//! Configuration module for vidrag.
//!
//! Handles loading and managing application settings and prompt templates.

mod model;
mod prompts;
mod settings;

pub use model::{ModelConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MODEL_NAME};
pub use prompts::{AnswerPrompts, Prompts, ReportPrompts, SummaryPrompts};
pub use settings::{
    AcquisitionSettings, EmbeddingSettings, GeneralSettings, ModelSettings, PromptSettings,
    SessionSettings, Settings,
};
