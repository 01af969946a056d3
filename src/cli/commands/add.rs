//! Add command implementation.

use super::status_sink;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::language::Language;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the add command.
pub async fn run_add(
    session: &str,
    url: &str,
    no_transcription: bool,
    language: Option<&str>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    // Without --language the session keeps its recorded language.
    let language = language.map(Language::normalize);
    let allow_transcription = settings.acquisition.allow_transcription && !no_transcription;

    let spinner = Output::spinner(&format!("Adding {} to '{}'...", url, session));
    let pipeline = Pipeline::new(&settings, status_sink(&spinner))?;

    match pipeline.add_video(session, url, allow_transcription, language).await {
        Ok(result) => {
            spinner.finish_and_clear();
            Output::success(&format!(
                "Added video to '{}' ({} videos)",
                session,
                result.session.documents.len()
            ));
            Output::header("New Video Summary / 新视频摘要");
            Output::block(&result.new_summary);
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to add video: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
