//! Token-budgeted summarization.
//!
//! Short transcripts are summarized in one call. Transcripts whose estimated
//! token count exceeds the model ceiling are split on line boundaries,
//! summarized chunk by chunk, and the chunk summaries are synthesized into
//! the final summary. Any generation failure degrades to a partial summary of
//! the beginning of the transcript, and then to a fixed notice.
//! [`Summarizer::summarize`] never fails.

use crate::acquisition::ContentUnit;
use crate::chunking::{split_lines, summary_chunk_budget};
use crate::config::Prompts;
use crate::error::Result;
use crate::events::{default_sink, SharedSink, StatusEvent};
use crate::language::Language;
use crate::llm::TextGenerator;
use crate::text::{clean_subtitle_text, truncate_chars, truncate_utf8, MAX_CONTENT_BYTES};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Returned for transcripts with nothing left after cleaning.
pub const NO_USABLE_TEXT: &str = "⚠️ Transcript contains no usable text / 转录内容为空";

/// Appended when the transcript was cut to the byte ceiling.
pub const TRUNCATION_NOTICE: &str =
    "\n\n⚠️ Note: Transcript truncated to first ~0.5MB to avoid API limits.";

/// Prefix of a summary built from the beginning of the transcript only.
pub const PARTIAL_SUMMARY_BANNER: &str =
    "⚠️ Partial Summary (video too long) / 部分摘要（视频过长）:\n\n";

/// Returned when every generation attempt failed.
pub const SUMMARY_FAILED: &str =
    "❌ Unable to generate summary due to text length limitations / 由于文本长度限制无法生成摘要";

const DEFAULT_TOKEN_CEILING: usize = 6_000;
const CHUNK_SUMMARY_MAX_CHARS: usize = 1_500;
const COMBINED_MAX_CHARS: usize = 10_000;
const PARTIAL_SUMMARY_CHARS: usize = 2_000;

/// Rough token count: one token per three characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 3
}

/// Per-request token ceiling for a chat model.
pub fn token_ceiling(model_name: &str) -> usize {
    match model_name {
        "gpt-5-mini" | "gpt-4o-mini" | "gpt-4o" | "gpt-4-turbo" => 100_000,
        "gpt-4" => 6_000,
        "gpt-3.5-turbo" => 12_000,
        _ => DEFAULT_TOKEN_CEILING,
    }
}

/// Produces language-selected summaries of content units.
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    model_name: String,
    prompts: Prompts,
    sink: SharedSink,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, model_name: impl Into<String>) -> Self {
        Self {
            generator,
            model_name: model_name.into(),
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

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Summarize a content unit in `language`.
    pub async fn summarize(&self, unit: &ContentUnit, language: Language) -> String {
        self.summarize_text(unit.text(), language).await
    }

    /// Summarize a content unit within the token ceiling of `model_name`.
    ///
    /// Used for sessions recorded with a model other than the configured one.
    pub async fn summarize_for_model(
        &self,
        unit: &ContentUnit,
        language: Language,
        model_name: &str,
    ) -> String {
        self.summarize_within(unit.text(), language, model_name).await
    }

    /// Summarize raw transcript text in `language`.
    pub async fn summarize_text(&self, text: &str, language: Language) -> String {
        self.summarize_within(text, language, &self.model_name).await
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn summarize_within(&self, text: &str, language: Language, model_name: &str) -> String {
        self.sink.emit(&StatusEvent::SummaryStarted);

        let cleaned = clean_subtitle_text(text);
        if cleaned.is_empty() {
            return NO_USABLE_TEXT.to_string();
        }

        let (body, notice) = if cleaned.len() > MAX_CONTENT_BYTES {
            let kept = truncate_utf8(&cleaned, MAX_CONTENT_BYTES);
            self.sink.emit(&StatusEvent::ContentTruncated {
                original_bytes: cleaned.len(),
                kept_bytes: kept.len(),
            });
            (kept, TRUNCATION_NOTICE)
        } else {
            (cleaned.as_str(), "")
        };

        match self.summarize_full(body, language, token_ceiling(model_name)).await {
            Ok(summary) => {
                self.sink.emit(&StatusEvent::SummaryReady);
                format!("{}{}", summary, notice)
            }
            Err(e) => {
                warn!("Summary generation failed, retrying on truncated text: {}", e);
                self.sink.emit(&StatusEvent::SummaryFallback);
                self.summarize_partial(&cleaned, language, notice).await
            }
        }
    }

    fn language_vars(language: Language) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("language_label".to_string(), language.label().to_string());
        vars.insert("language_reminder".to_string(), language.reminder().to_string());
        vars
    }

    async fn summarize_full(&self, text: &str, language: Language, ceiling: usize) -> Result<String> {
        let estimated = estimate_tokens(text);

        if estimated <= ceiling {
            debug!("Direct summary ({} estimated tokens)", estimated);
            let mut vars = Self::language_vars(language);
            vars.insert("transcript".to_string(), text.to_string());
            let prompt = self.prompts.render_with_custom(&self.prompts.summary.direct, &vars);
            return self.generator.generate(&prompt).await;
        }

        self.summarize_hierarchical(text, estimated, ceiling, language)
            .await
    }

    async fn summarize_hierarchical(
        &self,
        text: &str,
        estimated: usize,
        ceiling: usize,
        language: Language,
    ) -> Result<String> {
        let chunks = split_lines(text, summary_chunk_budget(ceiling));
        info!(
            "Hierarchical summary: {} estimated tokens over {} chunks",
            estimated,
            chunks.len()
        );
        self.sink.emit(&StatusEvent::HierarchicalSummary {
            estimated_tokens: estimated,
            chunks: chunks.len(),
        });

        let mut chunk_summaries = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let mut vars = Self::language_vars(language);
            vars.insert("chunk".to_string(), chunk.clone());
            let prompt = self.prompts.render_with_custom(&self.prompts.summary.chunk, &vars);

            let reply = self.generator.generate(&prompt).await?;
            chunk_summaries.push(cap_chunk_summary(reply.trim()));

            self.sink.emit(&StatusEvent::ChunkSummarized {
                index: i + 1,
                total: chunks.len(),
            });
        }

        let combined = bound_combined_summaries(&chunk_summaries.join("\n\n"), ceiling);

        let mut vars = Self::language_vars(language);
        vars.insert("chunk_summaries".to_string(), combined);
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.synthesis, &vars);
        self.generator.generate(&prompt).await
    }

    async fn summarize_partial(&self, cleaned: &str, language: Language, notice: &str) -> String {
        let mut vars = Self::language_vars(language);
        vars.insert(
            "transcript".to_string(),
            truncate_chars(cleaned, PARTIAL_SUMMARY_CHARS).to_string(),
        );
        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.summary.partial, &vars);

        match self.generator.generate(&prompt).await {
            Ok(partial) => {
                self.sink.emit(&StatusEvent::SummaryReady);
                format!("{}{}{}", PARTIAL_SUMMARY_BANNER, partial, notice)
            }
            Err(e) => {
                warn!("Partial summary failed: {}", e);
                self.sink.emit(&StatusEvent::SummaryFailed {
                    reason: e.to_string(),
                });
                SUMMARY_FAILED.to_string()
            }
        }
    }
}

fn cap_chunk_summary(summary: &str) -> String {
    if summary.chars().count() > CHUNK_SUMMARY_MAX_CHARS {
        format!("{}...", truncate_chars(summary, CHUNK_SUMMARY_MAX_CHARS))
    } else {
        summary.to_string()
    }
}

/// Keep the synthesis request within both the model ceiling and a fixed size.
fn bound_combined_summaries(combined: &str, ceiling: usize) -> String {
    let mut combined = combined.to_string();

    if estimate_tokens(&combined) > ceiling {
        combined = format!(
            "{}\n\n(Chunk summaries truncated for final synthesis due to length.)",
            truncate_chars(&combined, ceiling * 2)
        );
    }

    if combined.chars().count() > COMBINED_MAX_CHARS {
        combined = format!(
            "{}\n\n(Combined summary truncated to keep request small.)",
            truncate_chars(&combined, COMBINED_MAX_CHARS)
        );
    }

    combined
}
