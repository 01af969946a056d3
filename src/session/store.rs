//! Session persistence: `metadata.json` plus a SQLite vector index per session.
//!
//! Layout:
//!
//! ```text
//! <root>/<session_id>/metadata.json
//! <root>/<session_id>/index/vectors.db
//! ```
//!
//! The index is always extended before the metadata is rewritten. Chunk keys
//! are deterministic, so replaying an interrupted append replaces chunks
//! instead of duplicating them, and `load` prunes chunks the metadata does
//! not claim.

use super::metadata::{self, ChatTurn, DocumentRecord, SessionMetadata, SummaryRecord, SCHEMA_VERSION};
use crate::acquisition::ContentUnit;
use crate::chunking::{chunk_document, TextSplitter};
use crate::config::ModelConfig;
use crate::embedding::Embedder;
use crate::error::{Result, VidragError};
use crate::events::{cleanup_dir, default_sink, SharedSink, StatusEvent};
use crate::language::Language;
use crate::vector_store::{IndexRetriever, IndexedChunk, SqliteVectorIndex, VectorIndex};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const METADATA_FILE: &str = "metadata.json";
const INDEX_DIR: &str = "index";
const INDEX_FILE: &str = "vectors.db";

/// Default number of chunks handed to the answerer per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Input for [`SessionStore::create`].
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub documents: Vec<ContentUnit>,
    /// One summary per document, in the same order.
    pub summaries: Vec<SummaryRecord>,
    pub model: ModelConfig,
    pub language: Language,
    pub chat_history: Vec<ChatTurn>,
    /// Defaults to a fresh UUID v4.
    pub session_id: Option<String>,
}

/// Input for [`SessionStore::append`].
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub session_id: String,
    /// Every document of the session after the append.
    pub all_documents: Vec<ContentUnit>,
    /// The suffix of `all_documents` being added.
    pub new_documents: Vec<ContentUnit>,
    /// One summary per entry of `all_documents`.
    pub summaries: Vec<SummaryRecord>,
    pub combined_summary: String,
    pub combined_document: ContentUnit,
    pub chat_history: Vec<ChatTurn>,
    pub language: Language,
    /// Expected to match the session's recorded model; a mismatch is logged and ignored.
    pub model: ModelConfig,
}

/// A session reopened from disk.
pub struct LoadedSession {
    pub metadata: SessionMetadata,
    /// Documents rebuilt from the stored records, in session order.
    pub documents: Vec<ContentUnit>,
    pub retriever: IndexRetriever,
}

impl LoadedSession {
    pub fn session_id(&self) -> &str {
        &self.metadata.session_id
    }
}

impl std::fmt::Debug for LoadedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSession")
            .field("session_id", &self.metadata.session_id)
            .field("documents", &self.documents.len())
            .finish()
    }
}

/// Listing entry built from `metadata.json` alone.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub model_name: String,
    pub language: Language,
    pub video_urls: Vec<String>,
    pub chat_turns: usize,
}

/// Owns every session under one root directory.
pub struct SessionStore {
    root: PathBuf,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
    sink: SharedSink,
}

impl SessionStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            embedder,
            top_k: DEFAULT_TOP_K,
            sink: default_sink(),
        })
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one session. The id is not validated here.
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Create a session, replacing any existing session with the same id.
    ///
    /// On failure the session directory is removed before the error is returned.
    #[instrument(skip_all)]
    pub async fn create(&self, request: CreateRequest) -> Result<String> {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        validate_session_id(&session_id)?;
        request.model.validate()?;

        if request.documents.len() != request.summaries.len() {
            return Err(VidragError::InvalidInput(format!(
                "{} documents but {} summaries",
                request.documents.len(),
                request.summaries.len()
            )));
        }

        let dir = self.session_dir(&session_id);
        if dir.exists() {
            info!("Replacing existing session '{}'", session_id);
            std::fs::remove_dir_all(&dir).map_err(|e| {
                VidragError::Persistence(format!("could not replace session '{}': {}", session_id, e))
            })?;
        }

        match self.write_new_session(&dir, &session_id, request).await {
            Ok(chunks) => {
                info!("Created session '{}' with {} chunks", session_id, chunks);
                self.sink.emit(&StatusEvent::SessionCreated {
                    session_id: session_id.clone(),
                });
                Ok(session_id)
            }
            Err(e) => {
                warn!("Failed to create session '{}': {}", session_id, e);
                cleanup_dir(&dir, self.sink.as_ref());
                self.report_failure("create", &session_id, &e);
                Err(VidragError::Persistence(format!(
                    "could not create session '{}': {}",
                    session_id, e
                )))
            }
        }
    }

    async fn write_new_session(
        &self,
        dir: &Path,
        session_id: &str,
        request: CreateRequest,
    ) -> Result<usize> {
        std::fs::create_dir_all(dir)?;

        let records: Vec<DocumentRecord> = request.documents.iter().map(DocumentRecord::from).collect();
        let summary = metadata::combine_summaries(request.summaries.iter().map(|s| s.text.as_str()));

        let mut record = SessionMetadata {
            schema_version: SCHEMA_VERSION,
            session_id: session_id.to_string(),
            created_at: Utc::now(),
            model_name: request.model.model_name.clone(),
            chunk_size: request.model.chunk_size,
            chunk_overlap: request.model.chunk_overlap,
            video_urls: Vec::new(),
            documents: Vec::new(),
            summary,
            summaries: request.summaries,
            chat_history: request.chat_history,
            language: request.language,
            combined_content: None,
        };
        record.set_documents(records);
        record.validate()?;

        metadata::write_atomic(&dir.join(METADATA_FILE), &record)?;

        let index = SqliteVectorIndex::open(&index_path(dir))?;
        let splitter = TextSplitter::from_config(&request.model);
        self.index_documents(&index, &splitter, request.documents.iter().enumerate())
            .await
    }

    /// Reopen a session. Returns `None` if it is missing or unusable.
    #[instrument(skip(self))]
    pub async fn load(&self, session_id: &str) -> Option<LoadedSession> {
        match self.try_load(session_id).await {
            Ok(Some(session)) => {
                self.sink.emit(&StatusEvent::SessionLoaded {
                    session_id: session_id.to_string(),
                });
                Some(session)
            }
            Ok(None) => {
                self.sink.emit(&StatusEvent::SessionNotFound {
                    session_id: session_id.to_string(),
                });
                None
            }
            Err(e) => {
                warn!("Failed to load session '{}': {}", session_id, e);
                self.report_failure("load", session_id, &e);
                None
            }
        }
    }

    async fn try_load(&self, session_id: &str) -> Result<Option<LoadedSession>> {
        validate_session_id(session_id)?;
        let dir = self.session_dir(session_id);
        let metadata_path = dir.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Ok(None);
        }

        let (record, migrated) = metadata::read(&metadata_path, session_id)?;
        record.validate()?;

        if migrated {
            match metadata::write_atomic(&metadata_path, &record) {
                Ok(()) => info!("Migrated session '{}' to schema version {}", session_id, SCHEMA_VERSION),
                Err(e) => warn!("Could not write migrated metadata for '{}': {}", session_id, e),
            }
        }

        let documents = record.content_units();
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteVectorIndex::open(&index_path(&dir))?);
        self.reconcile(session_id, &record, &documents, index.as_ref())
            .await?;

        let retriever = IndexRetriever::new(index, self.embedder.clone(), self.top_k);
        Ok(Some(LoadedSession {
            metadata: record,
            documents,
            retriever,
        }))
    }

    /// Bring the index in line with the documents the metadata claims.
    async fn reconcile(
        &self,
        session_id: &str,
        record: &SessionMetadata,
        documents: &[ContentUnit],
        index: &dyn VectorIndex,
    ) -> Result<()> {
        let pruned = index.delete_documents_from(documents.len()).await?;

        let indexed = index.indexed_documents().await?;
        let missing: Vec<(usize, &ContentUnit)> = documents
            .iter()
            .enumerate()
            .filter(|(i, _)| !indexed.contains(i))
            .collect();

        let mut reindexed = 0;
        if !missing.is_empty() {
            let splitter = TextSplitter::from_config(&record.model_config()?);
            for (i, doc) in missing {
                if self.index_documents(index, &splitter, std::iter::once((i, doc))).await? > 0 {
                    reindexed += 1;
                }
            }
        }

        if pruned > 0 || reindexed > 0 {
            info!(
                "Reconciled index of '{}': pruned {} chunks, re-indexed {} documents",
                session_id, pruned, reindexed
            );
            self.sink.emit(&StatusEvent::IndexReconciled {
                session_id: session_id.to_string(),
                pruned,
                reindexed,
            });
        }
        Ok(())
    }

    /// Add documents to an existing session. Returns whether the append was persisted.
    #[instrument(skip_all, fields(session_id = %request.session_id))]
    pub async fn append(&self, request: AppendRequest) -> bool {
        let session_id = request.session_id.clone();
        match self.try_append(request).await {
            Ok(documents) => {
                self.sink.emit(&StatusEvent::SessionAppended {
                    session_id,
                    documents,
                });
                true
            }
            Err(e) => {
                warn!("Failed to append to session '{}': {}", session_id, e);
                self.report_failure("append", &session_id, &e);
                false
            }
        }
    }

    async fn try_append(&self, request: AppendRequest) -> Result<usize> {
        validate_session_id(&request.session_id)?;
        let dir = self.session_dir(&request.session_id);
        let metadata_path = dir.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(VidragError::SessionNotFound(request.session_id.clone()));
        }

        let (mut record, _) = metadata::read(&metadata_path, &request.session_id)?;
        record.validate()?;

        let base = check_suffix(&request.all_documents, &request.new_documents)?;
        if base != record.documents.len() {
            return Err(VidragError::InvalidInput(format!(
                "session has {} documents but the append starts at {}",
                record.documents.len(),
                base
            )));
        }
        if let Some(i) = record
            .documents
            .iter()
            .zip(&request.all_documents)
            .position(|(stored, doc)| stored.content != doc.text() || stored.metadata.source != doc.source_url())
        {
            return Err(VidragError::InvalidInput(format!(
                "document {} does not match the stored session",
                i
            )));
        }
        if request.summaries.len() != request.all_documents.len() {
            return Err(VidragError::InvalidInput(format!(
                "{} documents but {} summaries",
                request.all_documents.len(),
                request.summaries.len()
            )));
        }

        let policy = record.model_config()?;
        if request.model != policy {
            warn!(
                "Ignoring model {} ({}/{}) for '{}'; the session was recorded with {} ({}/{})",
                request.model.model_name,
                request.model.chunk_size,
                request.model.chunk_overlap,
                request.session_id,
                policy.model_name,
                policy.chunk_size,
                policy.chunk_overlap
            );
        }

        let index = SqliteVectorIndex::open(&index_path(&dir))?;
        let stale = index.delete_documents_from(base).await?;
        if stale > 0 {
            debug!("Removed {} chunks left by an interrupted append", stale);
        }
        let splitter = TextSplitter::from_config(&policy);
        let added = self
            .index_documents(
                &index,
                &splitter,
                request.new_documents.iter().enumerate().map(|(i, doc)| (base + i, doc)),
            )
            .await?;
        debug!("Indexed {} new chunks", added);

        record.set_documents(request.all_documents.iter().map(DocumentRecord::from).collect());
        record.summary = request.combined_summary;
        record.summaries = request.summaries;
        record.chat_history = request.chat_history;
        record.language = request.language;
        record.combined_content = Some(request.combined_document.text().to_string());
        record.validate()?;

        metadata::write_atomic(&metadata_path, &record)?;
        Ok(record.documents.len())
    }

    /// Read a session's metadata without touching its index.
    pub fn read_metadata(&self, session_id: &str) -> Result<SessionMetadata> {
        validate_session_id(session_id)?;
        let path = self.session_dir(session_id).join(METADATA_FILE);
        if !path.is_file() {
            return Err(VidragError::SessionNotFound(session_id.to_string()));
        }
        let (record, _) = metadata::read(&path, session_id)?;
        Ok(record)
    }

    /// All readable sessions, newest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not read sessions directory {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut sessions: Vec<SessionSummary> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(METADATA_FILE).is_file())
            .filter_map(|entry| {
                let dir_name = entry.file_name().to_string_lossy().to_string();
                match metadata::read(&entry.path().join(METADATA_FILE), &dir_name) {
                    Ok((record, _)) => Some(SessionSummary {
                        session_id: dir_name,
                        created_at: record.created_at,
                        model_name: record.model_name,
                        language: record.language,
                        video_urls: record.video_urls,
                        chat_turns: record.chat_history.len(),
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable session '{}': {}", dir_name, e);
                        None
                    }
                }
            })
            .collect();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Remove a session directory. Returns `false` if it does not exist.
    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) -> bool {
        if let Err(e) = validate_session_id(session_id) {
            warn!("{}", e);
            return false;
        }

        let dir = self.session_dir(session_id);
        if !dir.is_dir() {
            self.sink.emit(&StatusEvent::SessionNotFound {
                session_id: session_id.to_string(),
            });
            return false;
        }

        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Deleted session '{}'", session_id);
                self.sink.emit(&StatusEvent::SessionDeleted {
                    session_id: session_id.to_string(),
                });
                true
            }
            Err(e) => {
                warn!("Failed to delete session '{}': {}", session_id, e);
                self.report_failure("delete", session_id, &VidragError::Io(e));
                false
            }
        }
    }

    /// Replace the stored chat history. Only the metadata is rewritten.
    pub fn update_chat_history(&self, session_id: &str, history: &[ChatTurn]) -> bool {
        let result = self.read_metadata(session_id).and_then(|mut record| {
            record.chat_history = history.to_vec();
            metadata::write_atomic(&self.session_dir(session_id).join(METADATA_FILE), &record)
        });

        match result {
            Ok(()) => {
                self.sink.emit(&StatusEvent::ChatHistoryUpdated {
                    session_id: session_id.to_string(),
                });
                true
            }
            Err(e) => {
                warn!("Failed to update chat history of '{}': {}", session_id, e);
                self.report_failure("update chat history of", session_id, &e);
                false
            }
        }
    }

    /// Chunk, embed and store documents. Returns the number of chunks written.
    async fn index_documents<'a>(
        &self,
        index: &dyn VectorIndex,
        splitter: &TextSplitter,
        documents: impl Iterator<Item = (usize, &'a ContentUnit)>,
    ) -> Result<usize> {
        let chunks: Vec<_> = documents
            .flat_map(|(i, doc)| chunk_document(splitter, i, doc.source_url(), doc.text()))
            .collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(VidragError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let indexed: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect();
        index.upsert_batch(&indexed).await
    }

    fn report_failure(&self, operation: &str, session_id: &str, error: &VidragError) {
        self.sink.emit(&StatusEvent::PersistenceFailed {
            operation: operation.to_string(),
            session_id: session_id.to_string(),
            reason: error.to_string(),
        });
    }
}

fn index_path(session_dir: &Path) -> PathBuf {
    session_dir.join(INDEX_DIR).join(INDEX_FILE)
}

/// Session ids name a directory directly under the root.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let invalid = session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(|c| matches!(c, '/' | '\\' | '\0'));
    if invalid {
        return Err(VidragError::InvalidSessionId(session_id.to_string()));
    }
    Ok(())
}

/// Index in `all` where `new` starts, if `new` is a non-empty suffix of `all`.
fn check_suffix(all: &[ContentUnit], new: &[ContentUnit]) -> Result<usize> {
    if new.is_empty() {
        return Err(VidragError::InvalidInput("no new documents to append".into()));
    }
    if new.len() > all.len() || all[all.len() - new.len()..] != *new {
        return Err(VidragError::InvalidInput(
            "new documents are not a suffix of the full document list".into(),
        ));
    }
    Ok(all.len() - new.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ContentOrigin;
    use crate::events::ChannelSink;
    use crate::vector_store::testing::LetterEmbedder;
    use crate::vector_store::Retriever;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const TEXT_A: &str = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima mike";
    const TEXT_B: &str = "november oscar papa quebec romeo sierra tango uniform victor whiskey xray";
    const TEXT_C: &str = "yankee zulu apple banana cherry damson elder fig grape honeydew";

    fn unit(text: &str, n: usize) -> ContentUnit {
        ContentUnit::new(text, ContentOrigin::Subtitles, format!("https://youtu.be/video{:06}", n))
    }

    fn model() -> ModelConfig {
        ModelConfig::new("gpt-5-mini", 50, 10).unwrap()
    }

    fn summaries(docs: &[ContentUnit]) -> Vec<SummaryRecord> {
        docs.iter()
            .enumerate()
            .map(|(i, d)| SummaryRecord::new(d.source_url(), format!("summary {}", i)))
            .collect()
    }

    fn store(root: &TempDir) -> (SessionStore, Arc<LetterEmbedder>) {
        let embedder = Arc::new(LetterEmbedder::default());
        let store = SessionStore::new(root.path().join("sessions"), embedder.clone())
            .unwrap()
            .with_sink(Arc::new(crate::events::NullSink));
        (store, embedder)
    }

    fn create_request(docs: Vec<ContentUnit>, id: &str) -> CreateRequest {
        CreateRequest {
            summaries: summaries(&docs),
            documents: docs,
            model: model(),
            language: Language::En,
            chat_history: Vec::new(),
            session_id: Some(id.to_string()),
        }
    }

    fn append_request(id: &str, existing: Vec<ContentUnit>, new: ContentUnit) -> AppendRequest {
        let mut all = existing;
        all.push(new.clone());
        let summaries = summaries(&all);
        AppendRequest {
            session_id: id.to_string(),
            combined_summary: metadata::combine_summaries(summaries.iter().map(|s| s.text.as_str())),
            combined_document: ContentUnit::from_stored(
                &all.iter().map(|d| d.text()).collect::<Vec<_>>().join("\n\n"),
                ContentOrigin::Combined,
                all[0].source_url(),
            ),
            summaries,
            new_documents: vec![new],
            all_documents: all,
            chat_history: vec![ChatTurn::new("q", "a")],
            language: Language::En,
            model: model(),
        }
    }

    fn chunks_of(doc: &ContentUnit) -> usize {
        TextSplitter::from_config(&model()).split(doc.text()).len()
    }

    #[tokio::test]
    async fn test_create_then_load_single_document() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        let docs = vec![unit(TEXT_A, 1)];

        let id = store.create(create_request(docs.clone(), "single")).await.unwrap();
        assert_eq!(id, "single");

        let loaded = store.load("single").await.unwrap();
        assert_eq!(loaded.documents, docs);
        assert_eq!(loaded.metadata.summaries, summaries(&docs));
        assert_eq!(loaded.metadata.summary, "summary 0");
        assert_eq!(loaded.metadata.video_urls, vec![docs[0].source_url()]);
        assert_eq!(
            loaded.retriever.index().chunk_count().await.unwrap(),
            chunks_of(&docs[0])
        );
    }

    #[tokio::test]
    async fn test_create_then_load_many_documents() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        let docs = vec![unit(TEXT_A, 1), unit(TEXT_B, 2), unit(TEXT_C, 3)];

        store.create(create_request(docs.clone(), "many")).await.unwrap();
        let loaded = store.load("many").await.unwrap();

        assert_eq!(loaded.documents, docs);
        assert_eq!(loaded.metadata.summaries, summaries(&docs));
        assert!(loaded.metadata.summary.contains(&"-".repeat(50)));
        let indexed = loaded.retriever.index().indexed_documents().await.unwrap();
        assert_eq!(indexed.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_create_assigns_uuid_and_replaces_existing() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);

        let mut request = create_request(vec![unit(TEXT_A, 1)], "x");
        request.session_id = None;
        let id = store.create(request).await.unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        store.create(create_request(vec![unit(TEXT_A, 1), unit(TEXT_B, 2)], "dup")).await.unwrap();
        store.create(create_request(vec![unit(TEXT_C, 3)], "dup")).await.unwrap();
        let loaded = store.load("dup").await.unwrap();
        assert_eq!(loaded.documents, vec![unit(TEXT_C, 3)]);
        assert_eq!(
            loaded.retriever.index().chunk_count().await.unwrap(),
            chunks_of(&unit(TEXT_C, 3))
        );
    }

    #[tokio::test]
    async fn test_append_adds_only_new_chunks() {
        let root = tempfile::tempdir().unwrap();
        let (store, embedder) = store(&root);
        let docs = vec![unit(TEXT_A, 1), unit(TEXT_B, 2)];
        store.create(create_request(docs.clone(), "grow")).await.unwrap();

        let before = store.load("grow").await.unwrap();
        let chunks_before = before.retriever.index().chunk_count().await.unwrap();
        let calls_before = embedder.call_count();

        assert!(store.append(append_request("grow", docs, unit(TEXT_C, 3))).await);
        assert_eq!(embedder.call_count(), calls_before + 1);

        let after = store.load("grow").await.unwrap();
        assert_eq!(after.metadata.documents.len(), 3);
        assert_eq!(after.metadata.video_urls.len(), 3);
        assert_eq!(after.metadata.summaries.len(), 3);
        assert_eq!(after.metadata.video_urls[2], unit(TEXT_C, 3).source_url());
        assert_eq!(after.metadata.chat_history, vec![ChatTurn::new("q", "a")]);
        assert!(after.metadata.combined_content.as_deref().unwrap().contains("yankee"));
        assert_eq!(
            after.retriever.index().chunk_count().await.unwrap(),
            chunks_before + chunks_of(&unit(TEXT_C, 3))
        );

        let first_new_chunk = TextSplitter::from_config(&model()).split(TEXT_C).remove(0);
        let hits = after.retriever.retrieve(&first_new_chunk).await.unwrap();
        assert_eq!(hits[0].chunk.document_index, 2);
    }

    #[tokio::test]
    async fn test_append_keeps_recorded_model() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        let docs = vec![unit(TEXT_A, 1)];
        store.create(create_request(docs.clone(), "pinned")).await.unwrap();

        let mut request = append_request("pinned", docs, unit(TEXT_B, 2));
        request.model = ModelConfig::new("gpt-4o", 200, 0).unwrap();
        assert!(store.append(request).await);

        let loaded = store.load("pinned").await.unwrap();
        assert_eq!(loaded.metadata.model_config().unwrap(), model());
        assert_eq!(
            loaded.retriever.index().chunk_count().await.unwrap(),
            chunks_of(&unit(TEXT_A, 1)) + chunks_of(&unit(TEXT_B, 2))
        );
    }

    #[tokio::test]
    async fn test_consecutive_loads_are_equal() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        store.create(create_request(vec![unit(TEXT_A, 1), unit(TEXT_B, 2)], "stable")).await.unwrap();

        let first = store.load("stable").await.unwrap();
        let second = store.load("stable").await.unwrap();
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.documents, second.documents);
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_root_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        store.create(create_request(vec![unit(TEXT_A, 1)], "keep")).await.unwrap();

        let listing = |p: &Path| {
            let mut names: Vec<_> = std::fs::read_dir(p)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        let before = listing(store.root());

        assert!(!store.delete("missing"));
        assert_eq!(listing(store.root()), before);

        assert!(store.delete("keep"));
        assert!(!store.session_dir("keep").exists());
        assert!(store.load("keep").await.is_none());
    }

    #[tokio::test]
    async fn test_legacy_session_is_migrated_and_indexed() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        let dir = store.session_dir("legacy01");
        std::fs::create_dir_all(&dir).unwrap();
        let legacy = serde_json::json!({
            "session_id": "legacy01",
            "created_at": "2024-03-01T10:00:00.000000",
            "model_name": "gpt-4o",
            "chunk_size": 50,
            "chunk_overlap": 10,
            "video_url": "https://youtu.be/legacy00001",
            "content_type": "transcription",
            "summary": "old summary",
            "document_content": TEXT_A,
            "chat_history": [],
            "language": "zh"
        });
        std::fs::write(dir.join(METADATA_FILE), legacy.to_string()).unwrap();

        let (sink, mut rx) = ChannelSink::new();
        let store = store.with_sink(Arc::new(sink));
        let loaded = store.load("legacy01").await.unwrap();

        loaded.metadata.validate().unwrap();
        assert_eq!(loaded.documents[0].text(), TEXT_A);
        assert_eq!(loaded.documents[0].origin(), &ContentOrigin::Transcription);
        assert_eq!(loaded.metadata.summaries[0].text, "old summary");
        assert!(loaded.retriever.index().chunk_count().await.unwrap() > 0);

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join(METADATA_FILE)).unwrap()).unwrap();
        assert_eq!(on_disk["schema_version"], SCHEMA_VERSION);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&StatusEvent::IndexReconciled {
            session_id: "legacy01".into(),
            pruned: 0,
            reindexed: 1,
        }));
    }

    #[tokio::test]
    async fn test_replayed_append_does_not_duplicate_chunks() {
        let root = tempfile::tempdir().unwrap();
        let (store, embedder) = store(&root);
        let docs = vec![unit(TEXT_A, 1)];
        store.create(create_request(docs.clone(), "replay")).await.unwrap();

        // Index extended, metadata never rewritten.
        let index = SqliteVectorIndex::open(&index_path(&store.session_dir("replay"))).unwrap();
        let orphan = chunk_document(&TextSplitter::from_config(&model()), 1, "u", TEXT_C);
        let rows: Vec<IndexedChunk> = orphan
            .into_iter()
            .map(|chunk| IndexedChunk {
                embedding: LetterEmbedder::vector(&chunk.content),
                chunk,
            })
            .collect();
        index.upsert_batch(&rows).await.unwrap();
        drop(index);

        assert!(store.append(append_request("replay", docs, unit(TEXT_C, 3))).await);
        let loaded = store.load("replay").await.unwrap();
        assert_eq!(
            loaded.retriever.index().chunk_count().await.unwrap(),
            chunks_of(&unit(TEXT_A, 1)) + chunks_of(&unit(TEXT_C, 3))
        );
        assert!(embedder.call_count() > 0);
    }

    #[tokio::test]
    async fn test_orphan_chunks_pruned_on_load() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        store.create(create_request(vec![unit(TEXT_A, 1)], "orphans")).await.unwrap();

        let index = SqliteVectorIndex::open(&index_path(&store.session_dir("orphans"))).unwrap();
        let orphan = chunk_document(&TextSplitter::from_config(&model()), 4, "u", TEXT_B);
        let orphan_count = orphan.len();
        let rows: Vec<IndexedChunk> = orphan
            .into_iter()
            .map(|chunk| IndexedChunk {
                embedding: LetterEmbedder::vector(&chunk.content),
                chunk,
            })
            .collect();
        index.upsert_batch(&rows).await.unwrap();
        drop(index);

        let (sink, mut rx) = ChannelSink::new();
        let store = store.with_sink(Arc::new(sink));
        let loaded = store.load("orphans").await.unwrap();

        let indexed = loaded.retriever.index().indexed_documents().await.unwrap();
        assert_eq!(indexed.into_iter().collect::<Vec<_>>(), vec![0]);
        assert_eq!(
            rx.try_recv().unwrap(),
            StatusEvent::IndexReconciled {
                session_id: "orphans".into(),
                pruned: orphan_count,
                reindexed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_misaligned_append_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        let docs = vec![unit(TEXT_A, 1)];
        store.create(create_request(docs.clone(), "strict")).await.unwrap();

        let mut request = append_request("strict", docs.clone(), unit(TEXT_B, 2));
        request.summaries.pop();
        assert!(!store.append(request).await);

        let mut request = append_request("strict", docs.clone(), unit(TEXT_B, 2));
        request.new_documents.clear();
        assert!(!store.append(request).await);

        let request = append_request("strict", vec![unit(TEXT_C, 3)], unit(TEXT_B, 2));
        assert!(!store.append(request).await);

        assert!(!store.append(append_request("absent", docs, unit(TEXT_B, 2))).await);

        let loaded = store.load("strict").await.unwrap();
        assert_eq!(loaded.metadata.documents.len(), 1);
    }

    #[tokio::test]
    async fn test_update_chat_history() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        store.create(create_request(vec![unit(TEXT_A, 1)], "chat")).await.unwrap();

        let history = vec![ChatTurn::new("What?", "That."), ChatTurn::new("Why?", "Because.")];
        assert!(store.update_chat_history("chat", &history));
        assert!(!store.update_chat_history("nobody", &history));

        assert_eq!(store.read_metadata("chat").unwrap().chat_history, history);
    }

    #[test]
    fn test_session_id_validation() {
        for bad in ["", ".", "..", "a/b", "..\\x", "nul\0"] {
            assert!(validate_session_id(bad).is_err(), "{:?}", bad);
        }
        assert!(validate_session_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_session_id("my session").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_id_is_rejected_everywhere() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);

        assert!(store.create(create_request(vec![unit(TEXT_A, 1)], "../escape")).await.is_err());
        assert!(store.load("../escape").await.is_none());
        assert!(!store.delete(".."));
        assert!(!root.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_list_sorts_newest_first_and_skips_corrupt() {
        let root = tempfile::tempdir().unwrap();
        let (store, _) = store(&root);
        store.create(create_request(vec![unit(TEXT_A, 1)], "older")).await.unwrap();
        store.create(create_request(vec![unit(TEXT_B, 2)], "newer")).await.unwrap();

        let mut record = store.read_metadata("older").unwrap();
        record.created_at = DateTime::<Utc>::UNIX_EPOCH;
        metadata::write_atomic(&store.session_dir("older").join(METADATA_FILE), &record).unwrap();

        let corrupt = store.session_dir("corrupt");
        std::fs::create_dir_all(&corrupt).unwrap();
        std::fs::write(corrupt.join(METADATA_FILE), "{ not json").unwrap();

        let ids: Vec<String> = store.list().into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec!["newer", "older"]);
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(VidragError::Embedding("quota exceeded".into()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(VidragError::Embedding("quota exceeded".into()))
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    #[tokio::test]
    async fn test_failed_create_removes_session_dir() {
        let root = tempfile::tempdir().unwrap();
        let (sink, mut rx) = ChannelSink::new();
        let store = SessionStore::new(root.path(), Arc::new(FailingEmbedder))
            .unwrap()
            .with_sink(Arc::new(sink));

        let err = store
            .create(create_request(vec![unit(TEXT_A, 1)], "broken"))
            .await
            .unwrap_err();

        assert!(matches!(err, VidragError::Persistence(_)));
        assert!(!store.session_dir("broken").exists());
        assert!(matches!(
            rx.try_recv().unwrap(),
            StatusEvent::PersistenceFailed { .. }
        ));
    }
}
