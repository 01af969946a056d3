//! Ingestion pipeline.
//!
//! Wires acquisition, summarization, session persistence and answering
//! together: ingest a first video into a new session, add further videos to
//! it, and ask questions against it.

use crate::acquisition::{ContentAcquirer, ContentOrigin, ContentUnit, WhisperTranscriber, YtDlp};
use crate::answer::{Answer, Answerer};
use crate::config::{ModelConfig, Prompts, Settings};
use crate::embedding::OpenAIEmbedder;
use crate::error::{Result, VidragError};
use crate::events::{default_sink, SharedSink};
use crate::language::Language;
use crate::llm::{OpenAIGenerator, TextGenerator};
use crate::report::{Report, ReportGenerator};
use crate::session::{
    combine_summaries, AppendRequest, ChatTurn, CreateRequest, LoadedSession, SessionStore,
    SummaryRecord,
};
use crate::summarize::Summarizer;
use crate::video::{extract_video_id, is_youtube_url, normalize_url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Options for [`Pipeline::process_video`].
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub allow_transcription: bool,
    /// Defaults to the video id.
    pub session_id: Option<String>,
    /// Write the summary and the extracted text as `.txt` files here.
    pub export_dir: Option<PathBuf>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            allow_transcription: true,
            session_id: None,
            export_dir: None,
        }
    }
}

/// Outcome of ingesting a first video.
#[derive(Debug)]
pub struct ProcessResult {
    pub session: LoadedSession,
    pub summary: String,
    pub origin: ContentOrigin,
    /// Files written by the export step.
    pub exported: Vec<PathBuf>,
}

/// Outcome of adding a video to a session.
#[derive(Debug)]
pub struct AddVideoResult {
    pub session: LoadedSession,
    /// Summary of the added video alone.
    pub new_summary: String,
}

/// End-to-end pipeline over one sessions root.
pub struct Pipeline {
    acquirer: ContentAcquirer,
    summarizer: Summarizer,
    store: SessionStore,
    generator: Arc<dyn TextGenerator>,
    prompts: Prompts,
    model: ModelConfig,
    language: Language,
    sink: SharedSink,
}

impl Pipeline {
    /// Build the OpenAI and yt-dlp backed pipeline from settings.
    pub fn new(settings: &Settings, sink: SharedSink) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let model = settings.model_config()?;

        let generator: Arc<dyn TextGenerator> =
            Arc::new(OpenAIGenerator::from_settings(&settings.model)?);

        let ytdlp = Arc::new(YtDlp::from_settings(&settings.acquisition));
        let transcriber = Arc::new(WhisperTranscriber::with_model(
            &settings.acquisition.transcription_model,
        )?);

        let temp_dir = settings.temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let acquirer = ContentAcquirer::new(ytdlp.clone(), ytdlp, transcriber, temp_dir)
            .with_languages(settings.acquisition.subtitle_languages.clone())
            .with_sink(sink.clone());

        let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);
        let store = SessionStore::new(settings.sessions_dir(), embedder)?
            .with_top_k(settings.sessions.retriever_top_k)
            .with_sink(sink.clone());

        let summarizer = Summarizer::new(generator.clone(), model.model_name.clone())
            .with_prompts(prompts.clone())
            .with_sink(sink.clone());

        info!("Pipeline ready (model {}, sessions in {:?})", model.model_name, store.root());

        Ok(Self {
            acquirer,
            summarizer,
            store,
            generator,
            prompts,
            model,
            language: settings.language,
            sink,
        })
    }

    /// Build a pipeline from already constructed components.
    pub fn with_components(
        acquirer: ContentAcquirer,
        summarizer: Summarizer,
        store: SessionStore,
        generator: Arc<dyn TextGenerator>,
        model: ModelConfig,
    ) -> Self {
        Self {
            acquirer,
            summarizer,
            store,
            generator,
            prompts: Prompts::default(),
            model,
            language: Language::default(),
            sink: default_sink(),
        }
    }

    /// Set the summary language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Sink for events raised by the pipeline itself.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Ingest a video into a new session.
    #[instrument(skip(self, options))]
    pub async fn process_video(&self, url: &str, options: &ProcessOptions) -> Result<ProcessResult> {
        let url = validated_url(url)?;

        let unit = self.acquirer.acquire(&url, options.allow_transcription).await?;
        let summary = self.summarizer.summarize(&unit, self.language).await;

        let mut exported = Vec::new();
        if let Some(dir) = &options.export_dir {
            exported.push(export_summary(dir, &url, &summary)?);
            exported.push(export_content(dir, &unit)?);
        }

        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| extract_video_id(&url));

        let origin = unit.origin().clone();
        let session_id = self
            .store
            .create(CreateRequest {
                documents: vec![unit],
                summaries: vec![SummaryRecord::new(url.clone(), summary.clone())],
                model: self.model.clone(),
                language: self.language,
                chat_history: Vec::new(),
                session_id: Some(session_id),
            })
            .await?;

        let session = self.reload(&session_id).await?;
        Ok(ProcessResult {
            session,
            summary,
            origin,
            exported,
        })
    }

    /// Ingest another video into an existing session.
    ///
    /// The new video is summarized with the session's recorded model and, unless
    /// `language` is given, in the session's recorded language.
    #[instrument(skip(self))]
    pub async fn add_video(
        &self,
        session_id: &str,
        url: &str,
        allow_transcription: bool,
        language: Option<Language>,
    ) -> Result<AddVideoResult> {
        let url = validated_url(url)?;
        let session = self.reload(session_id).await?;
        let language = language.unwrap_or(session.metadata.language);
        let model = session.metadata.model_config()?;

        let unit = self.acquirer.acquire(&url, allow_transcription).await?;
        let new_summary = self
            .summarizer
            .summarize_for_model(&unit, language, &model.model_name)
            .await;

        let LoadedSession {
            metadata,
            mut documents,
            ..
        } = session;

        let mut summaries = metadata.summaries;
        summaries.push(SummaryRecord::new(url.clone(), new_summary.clone()));
        let combined_summary = combine_summaries(summaries.iter().map(|s| s.text.as_str()));

        documents.push(unit.clone());
        let combined_text = documents
            .iter()
            .map(ContentUnit::text)
            .collect::<Vec<_>>()
            .join("\n\n");
        let primary_source = metadata
            .video_urls
            .first()
            .cloned()
            .unwrap_or_else(|| url.clone());
        let combined_document =
            ContentUnit::from_stored(&combined_text, ContentOrigin::Combined, primary_source);

        let appended = self
            .store
            .append(AppendRequest {
                session_id: session_id.to_string(),
                all_documents: documents,
                new_documents: vec![unit],
                summaries,
                combined_summary,
                combined_document,
                chat_history: metadata.chat_history,
                language,
                model,
            })
            .await;
        if !appended {
            return Err(VidragError::Persistence(format!(
                "failed to add {} to session '{}'",
                url, session_id
            )));
        }

        let session = self.reload(session_id).await?;
        Ok(AddVideoResult {
            session,
            new_summary,
        })
    }

    /// Answer a question against a session and record the turn in its history.
    #[instrument(skip(self))]
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<Answer> {
        let session = self.reload(session_id).await?;
        let mut history = session.metadata.chat_history;

        let answerer = Answerer::new(Arc::new(session.retriever), self.generator.clone())
            .with_prompts(self.prompts.clone());
        let answer = answerer.answer(question, &history).await?;

        history.push(ChatTurn::new(question.trim(), answer.answer.clone()));
        if !self.store.update_chat_history(session_id, &history) {
            warn!("Answer for '{}' was not saved to the chat history", session_id);
        }

        Ok(answer)
    }

    /// Generate an analysis report of a session.
    ///
    /// Written in `language`, or in the session's recorded language.
    #[instrument(skip(self))]
    pub async fn report(&self, session_id: &str, language: Option<Language>) -> Result<Report> {
        let metadata = self.store.read_metadata(session_id)?;
        let language = language.unwrap_or(metadata.language);

        ReportGenerator::new(self.generator.clone())
            .with_prompts(self.prompts.clone())
            .with_sink(self.sink.clone())
            .generate(&metadata, language)
            .await
    }

    async fn reload(&self, session_id: &str) -> Result<LoadedSession> {
        self.store
            .load(session_id)
            .await
            .ok_or_else(|| VidragError::SessionNotFound(session_id.to_string()))
    }
}

fn validated_url(input: &str) -> Result<String> {
    let url = normalize_url(input);
    if !is_youtube_url(&url) {
        return Err(VidragError::InvalidInput(format!(
            "not a YouTube video URL: {}",
            input
        )));
    }
    Ok(url)
}

/// Write `<video_id>_summary.txt` into `dir`.
pub fn export_summary(dir: &Path, source_url: &str, summary: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}_summary.txt", extract_video_id(source_url)));
    let header = format!("Video Summary / 视频摘要\nSource: {}", source_url);
    write_text_file(&path, &header, summary)?;
    Ok(path)
}

/// Write `<video_id>_<origin>.txt` with the extracted text into `dir`.
pub fn export_content(dir: &Path, unit: &ContentUnit) -> Result<PathBuf> {
    let path = dir.join(format!(
        "{}_{}.txt",
        extract_video_id(unit.source_url()),
        unit.origin()
    ));
    let header = format!("Source: {}\nType: {}", unit.source_url(), unit.origin());
    write_text_file(&path, &header, unit.text())?;
    Ok(path)
}

fn write_text_file(path: &Path, header: &str, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = format!("{}\n{}\n\n{}", header, "=".repeat(50), body);
    std::fs::write(path, content)?;
    info!("Saved {:?}", path);
    Ok(())
}
