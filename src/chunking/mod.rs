//! Text chunking strategies.
//!
//! - [`TextSplitter`] cuts document text into overlapping chunks for the vector index.
//! - [`split_lines`] groups whole lines into bounded chunks for hierarchical summaries.

mod lines;
mod recursive;

pub use lines::{split_lines, summary_chunk_budget};
pub use recursive::TextSplitter;

use serde::{Deserialize, Serialize};

/// A chunk of one session document, the unit stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Position of the owning document in the session.
    pub document_index: usize,
    /// Position of this chunk within its document.
    pub chunk_order: usize,
    /// Source URL of the owning document.
    pub source_url: String,
    /// Chunk text.
    pub content: String,
}

impl DocumentChunk {
    /// Stable key: re-chunking the same document yields the same keys.
    pub fn key(&self) -> String {
        format!("{}:{}", self.document_index, self.chunk_order)
    }
}

/// Chunk one document with `splitter`.
pub fn chunk_document(
    splitter: &TextSplitter,
    document_index: usize,
    source_url: &str,
    text: &str,
) -> Vec<DocumentChunk> {
    splitter
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(chunk_order, content)| DocumentChunk {
            document_index,
            chunk_order,
            source_url: source_url.to_string(),
            content,
        })
        .collect()
}
