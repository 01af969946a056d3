//! Markdown analysis reports over a saved session.
//!
//! The report prompt sees the session's aggregate summary, an excerpt of its
//! cleaned transcript text and a short block of session metadata.

use crate::config::Prompts;
use crate::error::Result;
use crate::events::{default_sink, SharedSink, StatusEvent};
use crate::language::Language;
use crate::llm::TextGenerator;
use crate::session::SessionMetadata;
use crate::text::{clean_subtitle_text, truncate_chars, truncate_utf8};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const EXCERPT_MAX_BYTES: usize = 120_000;
const EXCERPT_MAX_CHARS: usize = 20_000;
const SUMMARY_EXCERPT_CHARS: usize = 4_000;

/// A generated analysis of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub session_id: String,
    pub language: Language,
    /// First video of the session, if any.
    pub source_url: Option<String>,
    pub analysis: String,
}

impl Report {
    /// Markdown file content: a title, the source video and the analysis.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("# {} Analysis", self.session_id), String::new()];
        if let Some(url) = &self.source_url {
            lines.push(format!("Source Video: {}", url));
            lines.push(String::new());
        }
        lines.push(self.analysis.clone());
        lines.join("\n")
    }

    /// Write the Markdown report to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_markdown())?;
        info!("Saved report to {:?}", path);
        Ok(())
    }
}

/// `<dir>/<session_id>_analysis.md`
pub fn default_report_path(dir: &Path, session_id: &str) -> PathBuf {
    dir.join(format!("{}_analysis.md", session_id))
}

/// Generates analysis reports with a [`TextGenerator`].
pub struct ReportGenerator {
    generator: Arc<dyn TextGenerator>,
    prompts: Prompts,
    sink: SharedSink,
}

impl ReportGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            prompts: Prompts::default(),
            sink: default_sink(),
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Analyze a session in `language`.
    ///
    /// Generation errors are reported through the sink and returned unchanged.
    #[instrument(skip(self, metadata), fields(session_id = %metadata.session_id))]
    pub async fn generate(&self, metadata: &SessionMetadata, language: Language) -> Result<Report> {
        let session_id = metadata.session_id.clone();
        self.sink.emit(&StatusEvent::ReportStarted {
            session_id: session_id.clone(),
        });

        let document = match &metadata.combined_content {
            Some(content) => content.clone(),
            None => metadata
                .documents
                .iter()
                .map(|d| d.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };

        let summary_block = if metadata.summary.trim().is_empty() {
            "(Summary not available)".to_string()
        } else {
            metadata.summary.clone()
        };
        let excerpt = transcript_excerpt(&document, &metadata.summary);
        let transcript_block = if excerpt.is_empty() {
            "(Transcript excerpt not available)".to_string()
        } else {
            excerpt
        };

        let mut vars = HashMap::new();
        vars.insert("summary_block".to_string(), summary_block);
        vars.insert("transcript_block".to_string(), transcript_block);
        vars.insert("metadata_block".to_string(), metadata_block(metadata));
        vars.insert(
            "language_instruction".to_string(),
            language.analysis_instruction().to_string(),
        );
        vars.insert("language_reminder".to_string(), language.reminder().to_string());
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.report.analysis, &vars);

        let analysis = match self.generator.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Report generation failed: {}", e);
                self.sink.emit(&StatusEvent::ReportFailed {
                    session_id,
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        self.sink.emit(&StatusEvent::ReportReady {
            session_id: session_id.clone(),
        });
        Ok(Report {
            session_id,
            language,
            source_url: metadata.video_urls.first().cloned(),
            analysis,
        })
    }
}

/// Cleaned transcript text capped for the report prompt.
///
/// Falls back to the start of the summary when the transcript is empty.
pub fn transcript_excerpt(document: &str, summary: &str) -> String {
    let cleaned = clean_subtitle_text(document);
    let excerpt = truncate_utf8(&cleaned, EXCERPT_MAX_BYTES);
    if excerpt.is_empty() {
        truncate_chars(summary, SUMMARY_EXCERPT_CHARS).to_string()
    } else {
        truncate_chars(excerpt, EXCERPT_MAX_CHARS).to_string()
    }
}

/// Session facts shown to the report prompt, one per line.
pub fn metadata_block(metadata: &SessionMetadata) -> String {
    let mut lines = Vec::new();
    if !metadata.video_urls.is_empty() {
        lines.push(format!("Video URLs: {}", metadata.video_urls.join(", ")));
    }
    lines.push(format!("Session Created At: {}", metadata.created_at.to_rfc3339()));
    if !metadata.model_name.is_empty() {
        lines.push(format!("Model: {}", metadata.model_name));
    }
    lines.push(format!("Chunk Size: {}", metadata.chunk_size));
    lines.join("\n")
}
