//! The durable session record (`metadata.json`).
//!
//! Records carry a `schema_version`. Records without one are version 1:
//! either the legacy single-document shape (`document_content`,
//! `video_url`, `content_type`) or the unversioned multi-document shape.
//! Both are migrated to the current version when read.

use crate::acquisition::{ContentOrigin, ContentUnit};
use crate::config::{ModelConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MODEL_NAME};
use crate::error::{Result, VidragError};
use crate::language::Language;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Schema version written by this crate.
pub const SCHEMA_VERSION: u32 = 2;

/// Separator between per-video summaries in the aggregate summary.
pub const SUMMARY_SEPARATOR: &str =
    "\n\n--------------------------------------------------\n\n";

/// Source and origin of one stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(rename = "type", default = "unknown_origin")]
    pub kind: ContentOrigin,
}

fn unknown_origin() -> ContentOrigin {
    ContentOrigin::Other(String::new())
}

/// One stored document: its text plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    #[serde(default)]
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl DocumentRecord {
    pub fn to_content_unit(&self) -> ContentUnit {
        ContentUnit::from_stored(&self.content, self.metadata.kind.clone(), &self.metadata.source)
    }
}

impl From<&ContentUnit> for DocumentRecord {
    fn from(unit: &ContentUnit) -> Self {
        Self {
            content: unit.text().to_string(),
            metadata: DocumentMetadata {
                source: unit.source_url().to_string(),
                kind: unit.origin().clone(),
            },
        }
    }
}

/// The summary of one ingested video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(rename = "video_url", default)]
    pub source_url: String,
    #[serde(rename = "summary", default)]
    pub text: String,
}

impl SummaryRecord {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            text: text.into(),
        }
    }
}

/// A question and its answer, stored as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

impl Serialize for ChatTurn {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.question, &self.answer).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChatTurn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let parts = Vec::<serde_json::Value>::deserialize(deserializer)?;
        let text = |i: usize| match parts.get(i) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Ok(ChatTurn {
            question: text(0),
            answer: text(1),
        })
    }
}

/// Join per-video summaries into the aggregate summary.
pub fn combine_summaries<'a>(summaries: impl IntoIterator<Item = &'a str>) -> String {
    summaries
        .into_iter()
        .collect::<Vec<_>>()
        .join(SUMMARY_SEPARATOR)
}

/// The durable session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub schema_version: u32,
    pub session_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub model_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Source URL of each document, index-aligned with `documents`.
    pub video_urls: Vec<String>,
    pub documents: Vec<DocumentRecord>,
    /// Per-video summaries joined by [`SUMMARY_SEPARATOR`].
    pub summary: String,
    pub summaries: Vec<SummaryRecord>,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default, deserialize_with = "lenient_language")]
    pub language: Language,
    /// Concatenated text of all documents, as of the last append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combined_content: Option<String>,
}

impl SessionMetadata {
    /// The chunking policy the session index was built with.
    pub fn model_config(&self) -> Result<ModelConfig> {
        ModelConfig::new(self.model_name.clone(), self.chunk_size, self.chunk_overlap)
    }

    /// Replace the document list, keeping `video_urls` aligned with it.
    pub fn set_documents(&mut self, documents: Vec<DocumentRecord>) {
        self.video_urls = documents.iter().map(|d| d.metadata.source.clone()).collect();
        self.documents = documents;
    }

    /// Check the alignment invariant and the recorded chunk policy.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(VidragError::Persistence(format!(
                "unsupported schema version {}",
                self.schema_version
            )));
        }

        let n = self.documents.len();
        if self.video_urls.len() != n || self.summaries.len() != n {
            return Err(VidragError::Persistence(format!(
                "misaligned session record: {} documents, {} urls, {} summaries",
                n,
                self.video_urls.len(),
                self.summaries.len()
            )));
        }

        if let Some(i) = self
            .documents
            .iter()
            .zip(&self.video_urls)
            .position(|(doc, url)| &doc.metadata.source != url)
        {
            return Err(VidragError::Persistence(format!(
                "video_urls[{}] does not match the source of documents[{}]",
                i, i
            )));
        }

        self.model_config()
            .map(|_| ())
            .map_err(|e| VidragError::Persistence(format!("invalid chunk policy: {}", e)))
    }

    pub fn content_units(&self) -> Vec<ContentUnit> {
        self.documents.iter().map(DocumentRecord::to_content_unit).collect()
    }
}

/// Version-1 record. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyMetadata {
    session_id: Option<String>,
    persist_name: Option<String>,
    created_at: Option<String>,
    model_name: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    video_url: Option<String>,
    content_type: Option<String>,
    document_content: Option<String>,
    documents: Option<Vec<DocumentRecord>>,
    summary: Option<String>,
    summaries: Option<Vec<SummaryRecord>>,
    chat_history: Option<Vec<ChatTurn>>,
    language: Option<String>,
}

impl LegacyMetadata {
    fn migrate(self, fallback_id: &str) -> SessionMetadata {
        let summary = self.summary.unwrap_or_default();

        let documents = match self.documents {
            Some(docs) if !docs.is_empty() => docs,
            _ => vec![DocumentRecord {
                content: self.document_content.unwrap_or_default(),
                metadata: DocumentMetadata {
                    source: self.video_url.clone().unwrap_or_default(),
                    kind: ContentOrigin::from(self.content_type.unwrap_or_default()),
                },
            }],
        };

        let mut summaries = self.summaries.unwrap_or_default();
        if summaries.is_empty() && documents.len() == 1 {
            summaries.push(SummaryRecord::new(
                documents[0].metadata.source.clone(),
                summary.clone(),
            ));
        }
        summaries.truncate(documents.len());
        for doc in documents.iter().skip(summaries.len()) {
            summaries.push(SummaryRecord::new(doc.metadata.source.clone(), String::new()));
        }

        let mut metadata = SessionMetadata {
            schema_version: SCHEMA_VERSION,
            session_id: self
                .session_id
                .or(self.persist_name)
                .unwrap_or_else(|| fallback_id.to_string()),
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            model_name: self
                .model_name
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            video_urls: Vec::new(),
            documents: Vec::new(),
            summary,
            summaries,
            chat_history: self.chat_history.unwrap_or_default(),
            language: self
                .language
                .as_deref()
                .map(Language::normalize)
                .unwrap_or_default(),
            combined_content: None,
        };
        metadata.set_documents(documents);
        metadata
    }
}

/// Decode a metadata file body, migrating older versions.
///
/// Returns the record and whether a migration happened.
pub fn decode(json: &str, fallback_id: &str) -> Result<(SessionMetadata, bool)> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    match value.get("schema_version").and_then(|v| v.as_u64()) {
        None => {
            debug!("Migrating version 1 record for '{}'", fallback_id);
            let legacy: LegacyMetadata = serde_json::from_value(value)?;
            Ok((legacy.migrate(fallback_id), true))
        }
        Some(v) if v == SCHEMA_VERSION as u64 => Ok((serde_json::from_value(value)?, false)),
        Some(v) => Err(VidragError::Persistence(format!(
            "unsupported schema version {}",
            v
        ))),
    }
}

/// Read and decode a metadata file.
pub fn read(path: &Path, fallback_id: &str) -> Result<(SessionMetadata, bool)> {
    let json = std::fs::read_to_string(path)?;
    decode(&json, fallback_id)
}

/// Write `metadata` to `path` atomically: temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, metadata: &SessionMetadata) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| VidragError::Persistence(format!("no parent directory for {:?}", path)))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, metadata)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| VidragError::Io(e.error))?;
    Ok(())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_language<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Language, D::Error> {
    let code = String::deserialize(deserializer)?;
    Ok(Language::normalize(&code))
}

/// RFC 3339 on write; naive ISO timestamps (taken as UTC) are accepted on read.
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_timestamp(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}
