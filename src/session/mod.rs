//! Persistent sessions: one or more ingested videos, their summaries, a
//! chat history and the vector index answering questions about them.

pub mod metadata;
mod store;

pub use metadata::{
    combine_summaries, ChatTurn, DocumentMetadata, DocumentRecord, SessionMetadata, SummaryRecord,
    SCHEMA_VERSION, SUMMARY_SEPARATOR,
};
pub use store::{
    validate_session_id, AppendRequest, CreateRequest, LoadedSession, SessionStore, SessionSummary,
    DEFAULT_TOP_K,
};
