//! Error types for vidrag.

use thiserror::Error;

/// Library-level error type for vidrag operations.
#[derive(Error, Debug)]
pub enum VidragError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No subtitles were found and audio transcription was not allowed.
    #[error("Content acquisition failed: {0}")]
    Acquisition(String),

    /// Audio download or speech-to-text failed.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Text generation failed: {0}")]
    Generation(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Session metadata or index could not be written or read.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Answer generation failed: {0}")]
    Answer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for vidrag operations.
pub type Result<T> = std::result::Result<T, VidragError>;
