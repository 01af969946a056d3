//! Ingest command implementation.

use super::{apply_language, status_sink};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Pipeline, ProcessOptions};
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(
    url: &str,
    session: Option<String>,
    no_transcription: bool,
    language: Option<&str>,
    export: Option<&str>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }
    apply_language(&mut settings, language);

    let options = ProcessOptions {
        allow_transcription: settings.acquisition.allow_transcription && !no_transcription,
        session_id: session,
        export_dir: export.map(Settings::expand_path),
    };

    let spinner = Output::spinner(&format!("Processing video: {}", url));
    let pipeline = Pipeline::new(&settings, status_sink(&spinner))?;

    match pipeline.process_video(url, &options).await {
        Ok(result) => {
            spinner.finish_and_clear();
            let session_id = result.session.session_id();

            Output::success(&format!("Video processing completed (from {})", result.origin));
            Output::header("Video Summary / 视频摘要");
            Output::block(&result.summary);

            Output::kv("Session", session_id);
            Output::kv(
                "Storage path",
                &pipeline.store().session_dir(session_id).display().to_string(),
            );
            Output::kv("Summary language", pipeline.language().label());
            for path in &result.exported {
                Output::kv("Saved", &path.display().to_string());
            }

            println!();
            Output::info(&format!(
                "Ask questions with: vidrag ask {} \"<question>\"",
                session_id
            ));
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Video processing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
