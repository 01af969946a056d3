//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian `f32` blobs and similarity is
//! computed in Rust. Session indexes are small, so a full scan per query is
//! acceptable.

use super::{cosine_similarity, IndexedChunk, RetrievedChunk, VectorIndex};
use crate::chunking::DocumentChunk;
use crate::error::{Result, VidragError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_key TEXT PRIMARY KEY,
    document_index INTEGER NOT NULL,
    chunk_order INTEGER NOT NULL,
    source_url TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_index);
"#;

/// SQLite-based vector index for one session.
pub struct SqliteVectorIndex {
    conn: Mutex<Connection>,
}

impl SqliteVectorIndex {
    /// Open (or create) an index database at `path`.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened vector index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VidragError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_chunk(row: &Row<'_>) -> rusqlite::Result<DocumentChunk> {
        let document_index: i64 = row.get(0)?;
        let chunk_order: i64 = row.get(1)?;
        Ok(DocumentChunk {
            document_index: document_index as usize,
            chunk_order: chunk_order as usize,
            source_url: row.get(2)?,
            content: row.get(3)?,
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn upsert_batch(&self, chunks: &[IndexedChunk]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let indexed_at = Utc::now().to_rfc3339();

        for item in chunks {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (chunk_key, document_index, chunk_order, source_url, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    item.chunk.key(),
                    item.chunk.document_index as i64,
                    item.chunk.chunk_order as i64,
                    item.chunk.source_url,
                    item.chunk.content,
                    Self::embedding_to_bytes(&item.embedding),
                    indexed_at,
                ],
            )?;
        }

        tx.commit()?;
        debug!("Upserted {} chunks", chunks.len());
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT document_index, chunk_order, source_url, content, embedding
            FROM chunks
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let chunk = Self::row_to_chunk(row)?;
            let embedding_bytes: Vec<u8> = row.get(4)?;
            Ok((chunk, Self::bytes_to_embedding(&embedding_bytes)))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (chunk, embedding) = row?;
            let score = cosine_similarity(query_embedding, &embedding);
            results.push(RetrievedChunk { chunk, score });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_documents_from(&self, first_index: usize) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM chunks WHERE document_index >= ?1",
            params![first_index as i64],
        )?;

        if deleted > 0 {
            info!("Deleted {} chunks from document {} on", deleted, first_index);
        }
        Ok(deleted)
    }

    async fn indexed_documents(&self) -> Result<BTreeSet<usize>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT document_index FROM chunks")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

        let mut indices = BTreeSet::new();
        for row in rows {
            indices.insert(row? as usize);
        }
        Ok(indices)
    }

    async fn document_chunks(&self, document_index: usize) -> Result<Vec<DocumentChunk>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT document_index, chunk_order, source_url, content
            FROM chunks
            WHERE document_index = ?1
            ORDER BY chunk_order
            "#,
        )?;

        let rows = stmt.query_map(params![document_index as i64], Self::row_to_chunk)?;
        let chunks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chunks)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
