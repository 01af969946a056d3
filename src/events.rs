//! Status events emitted by the pipeline components.
//!
//! Components receive an [`StatusSink`] at construction and report progress
//! through it. Sinks compose: [`FanoutSink`] forwards to several sinks, so the
//! CLI can print events while the same events are logged through `tracing`.

use crate::acquisition::ContentOrigin;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A progress or failure notice from one of the pipeline components.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    AcquisitionStarted { url: String },
    SubtitlesFound { file: String },
    SubtitlesMissing { url: String },
    TranscriptionStarted { url: String },
    /// Truncated stderr of an external tool.
    ToolDiagnostic { tool: String, message: String },
    ContentReady { origin: ContentOrigin, bytes: usize },
    ContentTruncated { original_bytes: usize, kept_bytes: usize },
    SummaryStarted,
    HierarchicalSummary { estimated_tokens: usize, chunks: usize },
    ChunkSummarized { index: usize, total: usize },
    SummaryFallback,
    SummaryReady,
    SummaryFailed { reason: String },
    SessionCreated { session_id: String },
    SessionLoaded { session_id: String },
    SessionAppended { session_id: String, documents: usize },
    SessionDeleted { session_id: String },
    SessionNotFound { session_id: String },
    ChatHistoryUpdated { session_id: String },
    IndexReconciled { session_id: String, pruned: usize, reindexed: usize },
    ReportStarted { session_id: String },
    ReportReady { session_id: String },
    ReportFailed { session_id: String, reason: String },
    PersistenceFailed { operation: String, session_id: String, reason: String },
    CleanupFailed { path: PathBuf, reason: String },
}

impl StatusEvent {
    /// Whether the event reports something that went wrong.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StatusEvent::SummaryFailed { .. }
                | StatusEvent::ReportFailed { .. }
                | StatusEvent::PersistenceFailed { .. }
                | StatusEvent::CleanupFailed { .. }
                | StatusEvent::SessionNotFound { .. }
        )
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusEvent::AcquisitionStarted { url } => write!(f, "Processing video: {}", url),
            StatusEvent::SubtitlesFound { file } => write!(f, "Using subtitles from {}", file),
            StatusEvent::SubtitlesMissing { url } => write!(f, "No subtitles found for {}", url),
            StatusEvent::TranscriptionStarted { url } => {
                write!(f, "Starting audio transcription for {}", url)
            }
            StatusEvent::ToolDiagnostic { tool, message } => write!(f, "{}: {}", tool, message),
            StatusEvent::ContentReady { origin, bytes } => {
                write!(f, "Content ready from {} ({} bytes)", origin, bytes)
            }
            StatusEvent::ContentTruncated { original_bytes, kept_bytes } => write!(
                f,
                "Transcript very long ({} bytes); truncated to {} bytes",
                original_bytes, kept_bytes
            ),
            StatusEvent::SummaryStarted => write!(f, "Generating video summary"),
            StatusEvent::HierarchicalSummary { estimated_tokens, chunks } => write!(
                f,
                "Text is long ({} estimated tokens), summarizing in {} chunks",
                estimated_tokens, chunks
            ),
            StatusEvent::ChunkSummarized { index, total } => {
                write!(f, "Summarized chunk {}/{}", index, total)
            }
            StatusEvent::SummaryFallback => write!(f, "Retrying summary with truncated text"),
            StatusEvent::SummaryReady => write!(f, "Summary generated"),
            StatusEvent::SummaryFailed { reason } => write!(f, "Summary failed: {}", reason),
            StatusEvent::SessionCreated { session_id } => {
                write!(f, "Session saved as '{}'", session_id)
            }
            StatusEvent::SessionLoaded { session_id } => {
                write!(f, "Session '{}' loaded", session_id)
            }
            StatusEvent::SessionAppended { session_id, documents } => write!(
                f,
                "Session '{}' updated ({} documents)",
                session_id, documents
            ),
            StatusEvent::SessionDeleted { session_id } => {
                write!(f, "Session '{}' deleted", session_id)
            }
            StatusEvent::SessionNotFound { session_id } => {
                write!(f, "Session '{}' not found", session_id)
            }
            StatusEvent::ChatHistoryUpdated { session_id } => {
                write!(f, "Chat history updated for '{}'", session_id)
            }
            StatusEvent::IndexReconciled { session_id, pruned, reindexed } => write!(
                f,
                "Index of '{}' reconciled ({} orphan chunks pruned, {} documents re-indexed)",
                session_id, pruned, reindexed
            ),
            StatusEvent::ReportStarted { session_id } => {
                write!(f, "Generating detailed analysis of '{}'", session_id)
            }
            StatusEvent::ReportReady { session_id } => {
                write!(f, "Analysis of '{}' generated", session_id)
            }
            StatusEvent::ReportFailed { session_id, reason } => {
                write!(f, "Analysis of '{}' failed: {}", session_id, reason)
            }
            StatusEvent::PersistenceFailed { operation, session_id, reason } => write!(
                f,
                "Failed to {} session '{}': {}",
                operation, session_id, reason
            ),
            StatusEvent::CleanupFailed { path, reason } => {
                write!(f, "Failed to clean up {}: {}", path.display(), reason)
            }
        }
    }
}

/// Receiver of status events.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: &StatusEvent);
}

/// Shared handle to a sink, as held by components.
pub type SharedSink = Arc<dyn StatusSink>;

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn emit(&self, _event: &StatusEvent) {}
}

/// Writes events to the `tracing` log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn emit(&self, event: &StatusEvent) {
        if event.is_failure() {
            warn!(target: "vidrag::status", "{}", event);
        } else {
            info!(target: "vidrag::status", "{}", event);
        }
    }
}

/// Forwards events into a tokio channel.
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusSink for ChannelSink {
    fn emit(&self, event: &StatusEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Forwards every event to each inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    pub fn with(mut self, sink: SharedSink) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutSink {
    fn emit(&self, event: &StatusEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Sink used when a component is built without one.
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Remove a temporary directory, reporting failures instead of ignoring them.
///
/// Returns whether the directory is gone afterwards.
pub fn cleanup_dir(path: &std::path::Path, sink: &dyn StatusSink) -> bool {
    match std::fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            sink.emit(&StatusEvent::CleanupFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
            false
        }
    }
}
