//! Sessions command implementation.

use super::status_sink;
use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, SessionAction};
use crate::config::Settings;
use crate::embedding::OpenAIEmbedder;
use crate::language::Language;
use crate::pipeline::Pipeline;
use crate::report::default_report_path;
use crate::session::SessionStore;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Run the sessions command.
pub async fn run_sessions(action: &SessionAction, settings: Settings) -> Result<()> {
    match action {
        SessionAction::List => {
            let store = open_store(&settings)?;
            let sessions = store.list();
            if sessions.is_empty() {
                Output::info("No saved sessions. Use 'vidrag ingest <url>' to create one.");
                return Ok(());
            }

            Output::header(&format!("Sessions ({})", sessions.len()));
            println!();
            for session in &sessions {
                Output::session_info(
                    &session.session_id,
                    &session.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.video_urls.len(),
                    session.chat_turns,
                );
            }
        }

        SessionAction::Show { session } => {
            let store = open_store(&settings)?;
            let metadata = store.read_metadata(session)?;

            Output::header(&format!("Session '{}'", metadata.session_id));
            Output::kv("Created", &metadata.created_at.to_rfc3339());
            Output::kv("Model", &metadata.model_name);
            Output::kv(
                "Chunking",
                &format!("{} chars, {} overlap", metadata.chunk_size, metadata.chunk_overlap),
            );
            Output::kv("Language", metadata.language.label());

            Output::header("Videos");
            for (record, summary) in metadata.documents.iter().zip(&metadata.summaries) {
                Output::list_item(&format!("{} ({})", record.metadata.source, record.metadata.kind));
                if !summary.text.is_empty() {
                    Output::block(&summary.text);
                }
            }

            if !metadata.chat_history.is_empty() {
                Output::header("Chat history");
                for turn in &metadata.chat_history {
                    Output::kv("Q", &turn.question);
                    Output::kv("A", &turn.answer);
                }
            }
        }

        SessionAction::Delete { session } => {
            if open_store(&settings)?.delete(session) {
                Output::success(&format!("Deleted session '{}'", session));
            } else {
                Output::error(&format!("Session '{}' not found", session));
                anyhow::bail!("session '{}' not found", session);
            }
        }

        SessionAction::Report {
            session,
            language,
            output,
        } => {
            run_report(session, language.as_deref(), output.as_deref(), &settings).await?;
        }
    }

    Ok(())
}

fn open_store(settings: &Settings) -> Result<SessionStore> {
    let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
    Ok(SessionStore::new(settings.sessions_dir(), embedder)?)
}

async fn run_report(
    session: &str,
    language: Option<&str>,
    output: Option<&str>,
    settings: &Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    let language = language.map(Language::normalize);
    let path = match output {
        Some(path) => PathBuf::from(path),
        None => default_report_path(Path::new("analysis"), session),
    };

    let spinner = Output::spinner(&format!("Analyzing '{}'...", session));
    let pipeline = Pipeline::new(settings, status_sink(&spinner))?;

    match pipeline.report(session, language).await {
        Ok(report) => {
            spinner.finish_and_clear();
            report.write_to(&path)?;
            Output::success(&format!("Analysis saved to {}", path.display()));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate analysis: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
