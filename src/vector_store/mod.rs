//! Vector index abstraction for session chunks.
//!
//! The index is a derived artifact: every row is a chunk of one session
//! document, keyed by `(document_index, chunk_order)`, so it can always be
//! rebuilt or reconciled from the session's documents.

mod sqlite;

pub use sqlite::SqliteVectorIndex;

use crate::chunking::DocumentChunk;
use crate::embedding::Embedder;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A chunk together with its embedding, ready for storage.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: DocumentChunk,
    pub embedding: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The matched chunk.
    pub chunk: DocumentChunk,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert chunks, replacing any existing chunk with the same key.
    async fn upsert_batch(&self, chunks: &[IndexedChunk]) -> Result<usize>;

    /// Most similar chunks to `query_embedding`, best first.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>>;

    /// Delete every chunk whose document index is `first_index` or greater.
    async fn delete_documents_from(&self, first_index: usize) -> Result<usize>;

    /// Document indices that have at least one chunk.
    async fn indexed_documents(&self) -> Result<BTreeSet<usize>>;

    /// Chunks of one document, in chunk order.
    async fn document_chunks(&self, document_index: usize) -> Result<Vec<DocumentChunk>>;

    /// Total number of stored chunks.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Answers a free-text query with the most relevant chunks.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>>;
}

/// Retriever backed by a [`VectorIndex`] and an [`Embedder`].
#[derive(Clone)]
pub struct IndexRetriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl IndexRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k: top_k.max(1),
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    #[instrument(skip(self))]
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        let query_embedding = self.embedder.embed(query).await?;
        let results = self.index.search(&query_embedding, self.top_k).await?;
        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}


#[cfg(test)]
mod tests {
    use super::testing::LetterEmbedder;
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_retriever_returns_closest_chunk() {
        let index = Arc::new(SqliteVectorIndex::in_memory().unwrap());
        let texts = ["aaaa aaaa", "zzzz zzzz", "mmmm mmmm"];
        let chunks: Vec<IndexedChunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| IndexedChunk {
                chunk: DocumentChunk {
                    document_index: i,
                    chunk_order: 0,
                    source_url: format!("https://youtu.be/v{}", i),
                    content: t.to_string(),
                },
                embedding: LetterEmbedder::vector(t),
            })
            .collect();
        index.upsert_batch(&chunks).await.unwrap();

        let retriever = IndexRetriever::new(index, Arc::new(LetterEmbedder::default()), 1);
        let results = retriever.retrieve("zz").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_index, 1);
    }
}
