//! Ask command implementation.

use super::status_sink;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(session: &str, question: &str, show_sources: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let spinner = Output::spinner("Searching session...");
    let pipeline = Pipeline::new(&settings, status_sink(&spinner))?;

    match pipeline.ask(session, question).await {
        Ok(answer) => {
            spinner.finish_and_clear();
            println!("\n{}\n", answer.answer);

            if show_sources && !answer.sources.is_empty() {
                Output::header("Sources");
                for source in &answer.sources {
                    Output::source(&source.chunk.source_url, source.score, &source.chunk.content);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
