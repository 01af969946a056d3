//! Prompt templates for vidrag.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.
//! Templates use `{{name}}` placeholders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    pub answer: AnswerPrompts,
    pub report: ReportPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts used by the summarizer.
///
/// Every template receives `{{language_label}}` and `{{language_reminder}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    /// Single-call summary. Receives `{{transcript}}`.
    pub direct: String,
    /// Per-chunk summary on the hierarchical path. Receives `{{chunk}}`.
    pub chunk: String,
    /// Final synthesis over chunk summaries. Receives `{{chunk_summaries}}`.
    pub synthesis: String,
    /// Partial summary over the beginning of the transcript. Receives `{{transcript}}`.
    pub partial: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            direct: r#"You are a helpful assistant skilled at summarizing YouTube videos.
I will provide you with the transcript of a video. Please create a concise summary that:

1. Explains the core topic and main ideas of the video.
2. Extracts the key points in a logical order, preferably as a list.
3. Highlights any conclusions, recommendations, or methods mentioned.
4. Avoids repeating sentences verbatim; paraphrase in your own words.
5. Uses simple, clear language so someone who hasn't watched the video can understand.
6. Writes the summary in {{language_label}}.

Now summarize the following transcript:

{{transcript}}

{{language_reminder}}"#
                .to_string(),

            chunk: r#"Summarize this part of a YouTube video transcript. Focus on:
1. Main topics and key points
2. Important information and conclusions
3. Keep it concise (under 200 words) but comprehensive
4. Respond in {{language_label}}.

Transcript part:
{{chunk}}

{{language_reminder}}"#
                .to_string(),

            synthesis: r#"You are a helpful assistant skilled at summarizing YouTube videos.
I will provide you with summaries of different parts of a video transcript. Please create a comprehensive final summary that:

1. Explains the core topic and main ideas of the video.
2. Extracts the key points in a logical order, preferably as a list.
3. Highlights any conclusions, recommendations, or methods mentioned.
4. Avoids repeating information; synthesize and organize the content.
5. Uses simple, clear language so someone who hasn't watched the video can understand.
6. Writes the final summary in {{language_label}}.

Chunk summaries to synthesize:

{{chunk_summaries}}

{{language_reminder}}"#
                .to_string(),

            partial: r#"You are a helpful assistant skilled at summarizing YouTube videos.
This is a truncated transcript (beginning portion) of a video. Please create a summary based on available content:

1. Explain what topics are covered in this portion
2. Extract key points mentioned
3. Note that this is a partial summary due to length constraints
4. Write the summary in {{language_label}}.

Transcript (truncated):
{{transcript}}

{{language_reminder}}"#
                .to_string(),
        }
    }
}

/// Prompts for question answering over a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    /// System prompt. Receives `{{context}}`.
    pub system: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"Answer user questions based on the following context.
If you don't know the answer, say "I don't know" and don't make up answers.
Please answer in the same language as the question.

基于以下上下文回答用户问题。
如果不知道答案，请说"我不知道"，不要编造答案。
请用与问题相同的语言回答。

Context / 上下文: {{context}}"#
                .to_string(),
        }
    }
}

/// Prompts for session analysis reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportPrompts {
    /// Receives `{{summary_block}}`, `{{transcript_block}}`, `{{metadata_block}}`,
    /// `{{language_instruction}}` and `{{language_reminder}}`.
    pub analysis: String,
}

impl Default for ReportPrompts {
    fn default() -> Self {
        Self {
            analysis: r#"You are an analyst who writes structured reports about video content.
Using the provided summary, transcript excerpt, and metadata, craft a structured analysis of the videos. {{language_instruction}}

The analysis must be returned as Markdown with the following sections (use headings with '## '):
1. Overview: concise description of the videos and their context.
2. Key Themes: bullet list of the major topics and the speakers' perspectives.
3. Takeaways: actionable lessons or insights for the viewer.
4. Q&A Highlights: notable questions raised in the videos and how they were answered, if any.
5. Notable Quotes: 3-5 memorable quotes with approximate timestamps if evident in the excerpt; if no timestamps are available, note that.
6. Suggested Follow-up Questions: questions worth exploring in further research.

Keep the tone analytical yet accessible. Reference concrete details from the context when possible. Avoid inventing facts that are not supported by the provided materials.

Summary:
{{summary_block}}

Transcript Excerpt:
{{transcript_block}}

Metadata:
{{metadata_block}}

{{language_reminder}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
            }

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }

            let report_path = custom_path.join("report.toml");
            if report_path.exists() {
                let content = std::fs::read_to_string(&report_path)?;
                prompts.report = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.summary.direct.contains("{{transcript}}"));
        assert!(prompts.summary.chunk.contains("{{chunk}}"));
        assert!(prompts.summary.synthesis.contains("{{chunk_summaries}}"));
        assert!(prompts.answer.system.contains("{{context}}"));
        assert!(prompts.report.analysis.contains("{{transcript_block}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_provided_vars_override_custom() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("name".to_string(), "config".to_string());
        prompts.variables.insert("team".to_string(), "research".to_string());

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "call".to_string());

        let out = prompts.render_with_custom("{{name}}/{{team}}", &vars);
        assert_eq!(out, "call/research");
    }

    #[test]
    fn test_load_custom_summary_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("summary.toml"),
            "direct = \"Summarize: {{transcript}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.summary.direct, "Summarize: {{transcript}}");
        // Unspecified fields keep their defaults.
        assert!(prompts.summary.chunk.contains("{{chunk}}"));
    }

    #[test]
    fn test_load_custom_report_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("report.toml"),
            "analysis = \"Lecture notes for {{summary_block}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.report.analysis, "Lecture notes for {{summary_block}}");
        assert!(prompts.answer.system.contains("{{context}}"));
    }
}
