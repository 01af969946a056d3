//! vidrag - YouTube summaries and question answering
//!
//! Turns a YouTube video into a summary and a searchable session that can
//! grow to cover several videos.
//!
//! # Overview
//!
//! - Acquire a video's text from its subtitles, falling back to transcribing
//!   the audio with Whisper
//! - Summarize it within the model's token budget, hierarchically when the
//!   transcript is long
//! - Persist the text, summaries and chat history of a session next to a
//!   vector index, and keep both consistent as videos are appended
//! - Answer questions about a session from retrieved chunks
//! - Write a structured Markdown analysis of a session
//!
//! # Architecture
//!
//! - `text` - Subtitle cleanup and byte budgeting
//! - `acquisition` - Subtitle and audio acquisition (yt-dlp, Whisper)
//! - `summarize` - Token-budgeted summarization
//! - `chunking` - Index and summary chunk splitters
//! - `embedding` - Embedding generation
//! - `vector_store` - Per-session vector index
//! - `session` - Session metadata and persistence
//! - `answer` - Retrieval-augmented answering
//! - `report` - Markdown analysis reports over a session
//! - `pipeline` - Ingest / add / ask flows
//! - `events` - Status reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vidrag::config::Settings;
//! use vidrag::events::TracingSink;
//! use vidrag::pipeline::{Pipeline, ProcessOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(&settings, Arc::new(TracingSink))?;
//!
//!     let result = pipeline
//!         .process_video("https://www.youtube.com/watch?v=dQw4w9WgXcQ", &ProcessOptions::default())
//!         .await?;
//!     println!("{}", result.summary);
//!
//!     let answer = pipeline.ask(result.session.session_id(), "What is the video about?").await?;
//!     println!("{}", answer.answer);
//!     Ok(())
//! }
//! ```

pub mod acquisition;
pub mod answer;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod events;
pub mod language;
pub mod llm;
pub mod openai;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod summarize;
pub mod text;
pub mod vector_store;
pub mod video;

pub use error::{Result, VidragError};
