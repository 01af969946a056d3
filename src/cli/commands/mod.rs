//! CLI command implementations.

mod add;
mod ask;
mod config;
mod ingest;
mod sessions;

pub use add::run_add;
pub use ask::run_ask;
pub use config::run_config;
pub use ingest::run_ingest;
pub use sessions::run_sessions;

use crate::cli::ConsoleSink;
use crate::config::Settings;
use crate::events::{FanoutSink, SharedSink, TracingSink};
use crate::language::Language;
use indicatif::ProgressBar;
use std::sync::Arc;

/// Status events go to the log and to the spinner.
fn status_sink(spinner: &ProgressBar) -> SharedSink {
    Arc::new(FanoutSink::new(vec![
        Arc::new(TracingSink),
        Arc::new(ConsoleSink::new(spinner.clone())),
    ]))
}

/// Apply a `--language` override.
fn apply_language(settings: &mut Settings, language: Option<&str>) {
    if let Some(code) = language {
        settings.language = Language::normalize(code);
    }
}
