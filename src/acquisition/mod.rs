//! Content acquisition: subtitles first, audio transcription as fallback.
//!
//! [`ContentAcquirer`] turns a video URL into one sanitized [`ContentUnit`].
//! It asks a [`SubtitleFetcher`] for subtitle files in a private temp
//! directory and picks the best one by language preference. When no usable
//! subtitles exist and transcription is allowed, it downloads the audio with
//! an [`AudioDownloader`] and runs it through a [`Transcriber`].

mod whisper;
mod ytdlp;

pub use whisper::{is_api_key_configured, WhisperTranscriber};
pub use ytdlp::YtDlp;

use crate::error::{Result, VidragError};
use crate::events::{cleanup_dir, default_sink, SharedSink, StatusEvent};
use crate::text::{sanitize, truncate_utf8, MAX_CONTENT_BYTES};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Subtitle languages requested from the video host, in preference order.
pub const DEFAULT_SUBTITLE_LANGUAGES: &[&str] = &[
    "zh-Hans", "zh", "zh-CN", "zh-TW", "en", "ja", "ko", "es", "fr", "de", "pt", "ru", "ar", "hi",
    "it", "nl", "sv", "no", "da", "fi", "pl", "tr", "th", "vi",
];

/// Subtitle file extensions accepted, in preference order.
const SUBTITLE_EXTENSIONS: [&str; 2] = ["vtt", "srt"];

/// Where a piece of content came from.
///
/// Stored as the document `type` in session metadata. Tags written by other
/// tools are kept verbatim in [`ContentOrigin::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentOrigin {
    Subtitles,
    Transcription,
    /// Concatenation of several documents.
    Combined,
    Other(String),
}

impl ContentOrigin {
    pub fn as_str(&self) -> &str {
        match self {
            ContentOrigin::Subtitles => "subtitles",
            ContentOrigin::Transcription => "transcription",
            ContentOrigin::Combined => "combined",
            ContentOrigin::Other(tag) => tag,
        }
    }
}

impl From<String> for ContentOrigin {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "subtitles" => ContentOrigin::Subtitles,
            "transcription" => ContentOrigin::Transcription,
            "combined" => ContentOrigin::Combined,
            _ => ContentOrigin::Other(tag),
        }
    }
}

impl From<ContentOrigin> for String {
    fn from(origin: ContentOrigin) -> Self {
        origin.as_str().to_string()
    }
}

impl std::fmt::Display for ContentOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sanitized text of one video, tagged with its origin. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUnit {
    text: String,
    origin: ContentOrigin,
    source_url: String,
}

impl ContentUnit {
    /// Build a unit from raw extracted text; markup is stripped and the byte cap applied.
    pub fn new(raw_text: &str, origin: ContentOrigin, source_url: impl Into<String>) -> Self {
        Self {
            text: sanitize(raw_text),
            origin,
            source_url: source_url.into(),
        }
    }

    /// Rebuild a unit from already-sanitized stored text. Only the byte cap is applied.
    pub fn from_stored(text: &str, origin: ContentOrigin, source_url: impl Into<String>) -> Self {
        Self {
            text: truncate_utf8(text, MAX_CONTENT_BYTES).to_string(),
            origin,
            source_url: source_url.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> &ContentOrigin {
        &self.origin
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Writes subtitle files for a video into a directory.
#[async_trait]
pub trait SubtitleFetcher: Send + Sync {
    /// Request subtitles in `languages` for `url`, writing files into `dir`.
    ///
    /// An error does not mean no files were written; callers inspect `dir`.
    async fn fetch_subtitles(&self, url: &str, languages: &[String], dir: &Path) -> Result<()>;
}

/// Downloads a video's audio track.
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Download compact audio for `url` into `dir`, returning the file path.
    async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf>;
}

/// Speech-to-text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// Pick the subtitle file to use from the files a fetch produced.
///
/// Files are ranked by the position of their language tag in `languages`
/// (unknown tags last), then by format (vtt before srt). File names follow
/// the `<name>.<lang>.<ext>` pattern. Non-subtitle files are ignored.
pub fn select_subtitle_file(files: &[PathBuf], languages: &[String]) -> Option<PathBuf> {
    files
        .iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let (stem, ext) = name.rsplit_once('.')?;
            let format_rank = SUBTITLE_EXTENSIONS
                .iter()
                .position(|e| e.eq_ignore_ascii_case(ext))?;
            let language_rank = stem
                .rsplit_once('.')
                .and_then(|(_, lang)| languages.iter().position(|l| l == lang))
                .unwrap_or(languages.len());
            Some(((language_rank, format_rank, name.to_string()), path))
        })
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path.clone())
}

/// Obtains the text content of a video.
pub struct ContentAcquirer {
    subtitles: Arc<dyn SubtitleFetcher>,
    audio: Arc<dyn AudioDownloader>,
    transcriber: Arc<dyn Transcriber>,
    languages: Vec<String>,
    temp_root: PathBuf,
    sink: SharedSink,
}

impl ContentAcquirer {
    pub fn new(
        subtitles: Arc<dyn SubtitleFetcher>,
        audio: Arc<dyn AudioDownloader>,
        transcriber: Arc<dyn Transcriber>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            subtitles,
            audio,
            transcriber,
            languages: DEFAULT_SUBTITLE_LANGUAGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            temp_root: temp_root.into(),
            sink: default_sink(),
        }
    }

    /// Replace the subtitle language preference list.
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Obtain sanitized content for `url`.
    ///
    /// Fails with [`VidragError::Acquisition`] when there are no subtitles and
    /// `allow_transcription` is false, and with [`VidragError::Transcription`]
    /// when the audio fallback fails.
    #[instrument(skip(self))]
    pub async fn acquire(&self, url: &str, allow_transcription: bool) -> Result<ContentUnit> {
        self.sink.emit(&StatusEvent::AcquisitionStarted { url: url.to_string() });

        if let Some(unit) = self.try_subtitles(url).await? {
            self.emit_ready(&unit);
            return Ok(unit);
        }

        self.sink.emit(&StatusEvent::SubtitlesMissing { url: url.to_string() });

        if !allow_transcription {
            return Err(VidragError::Acquisition(
                "No subtitles found and audio transcription not allowed".to_string(),
            ));
        }

        self.sink.emit(&StatusEvent::TranscriptionStarted { url: url.to_string() });
        let unit = self.transcribe(url).await?;
        self.emit_ready(&unit);
        Ok(unit)
    }

    fn emit_ready(&self, unit: &ContentUnit) {
        info!("Acquired {} bytes from {}", unit.text().len(), unit.origin());
        self.sink.emit(&StatusEvent::ContentReady {
            origin: unit.origin().clone(),
            bytes: unit.text().len(),
        });
    }

    fn work_dir(&self, purpose: &str) -> Result<PathBuf> {
        let dir = self.temp_root.join(format!("{}-{}", purpose, Uuid::new_v4()));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    async fn try_subtitles(&self, url: &str) -> Result<Option<ContentUnit>> {
        let dir = self.work_dir("subs")?;
        let result = self.read_best_subtitles(url, &dir).await;
        cleanup_dir(&dir, self.sink.as_ref());
        result
    }

    async fn read_best_subtitles(&self, url: &str, dir: &Path) -> Result<Option<ContentUnit>> {
        if let Err(e) = self.subtitles.fetch_subtitles(url, &self.languages, dir).await {
            warn!("Subtitle fetch failed: {}", e);
            self.sink.emit(&StatusEvent::ToolDiagnostic {
                tool: "subtitles".to_string(),
                message: e.to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            files.push(entry?.path());
        }
        debug!("Subtitle fetch produced {} files", files.len());

        let Some(file) = select_subtitle_file(&files, &self.languages) else {
            return Ok(None);
        };

        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(&file).await?;
        let unit = ContentUnit::new(
            &String::from_utf8_lossy(&bytes),
            ContentOrigin::Subtitles,
            url,
        );

        if unit.is_empty() {
            warn!("Subtitle file {} holds no usable text", file_name);
            return Ok(None);
        }

        self.sink.emit(&StatusEvent::SubtitlesFound { file: file_name });
        Ok(Some(unit))
    }

    async fn transcribe(&self, url: &str) -> Result<ContentUnit> {
        let dir = self.work_dir("audio")?;
        let result = self.download_and_transcribe(url, &dir).await;
        cleanup_dir(&dir, self.sink.as_ref());
        result
    }

    async fn download_and_transcribe(&self, url: &str, dir: &Path) -> Result<ContentUnit> {
        let audio_path = self
            .audio
            .download_audio(url, dir)
            .await
            .map_err(into_transcription_error)?;

        let text = self
            .transcriber
            .transcribe(&audio_path)
            .await
            .map_err(into_transcription_error)?;

        Ok(ContentUnit::new(&text, ContentOrigin::Transcription, url))
    }
}

fn into_transcription_error(e: VidragError) -> VidragError {
    match e {
        VidragError::Transcription(msg) => VidragError::Transcription(msg),
        other => VidragError::Transcription(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    /// Writes a fixed set of files, optionally reporting failure afterwards.
    struct FakeSubtitles {
        files: Vec<(&'static str, &'static str)>,
        fail: bool,
    }

    #[async_trait]
    impl SubtitleFetcher for FakeSubtitles {
        async fn fetch_subtitles(&self, _url: &str, _languages: &[String], dir: &Path) -> Result<()> {
            for (name, body) in &self.files {
                std::fs::write(dir.join(name), body)?;
            }
            if self.fail {
                return Err(VidragError::Acquisition("yt-dlp exited with 1".into()));
            }
            Ok(())
        }
    }

    struct FakeAudio {
        fail: bool,
        dirs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl AudioDownloader for FakeAudio {
        async fn download_audio(&self, _url: &str, dir: &Path) -> Result<PathBuf> {
            self.dirs.lock().unwrap().push(dir.to_path_buf());
            if self.fail {
                return Err(VidragError::Transcription("Details: HTTP Error 403".into()));
            }
            let path = dir.join("audio.m4a");
            std::fs::write(&path, b"fake audio")?;
            Ok(path)
        }
    }

    #[derive(Default)]
    struct FakeTranscriber {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(audio_path.exists());
            Ok("  spoken words  \n\n".to_string())
        }
    }

    fn acquirer(
        subs: FakeSubtitles,
        audio_fails: bool,
        root: &Path,
    ) -> (ContentAcquirer, Arc<FakeTranscriber>) {
        let transcriber = Arc::new(FakeTranscriber::default());
        let acquirer = ContentAcquirer::new(
            Arc::new(subs),
            Arc::new(FakeAudio {
                fail: audio_fails,
                dirs: Mutex::new(Vec::new()),
            }),
            transcriber.clone(),
            root,
        );
        (acquirer, transcriber)
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_select_prefers_language_order() {
        let languages: Vec<String> = DEFAULT_SUBTITLE_LANGUAGES.iter().map(|s| s.to_string()).collect();
        let files = vec![
            PathBuf::from("/t/subtitle.en.vtt"),
            PathBuf::from("/t/subtitle.zh-Hans.srt"),
            PathBuf::from("/t/subtitle.ja.vtt"),
        ];
        assert_eq!(
            select_subtitle_file(&files, &languages),
            Some(PathBuf::from("/t/subtitle.zh-Hans.srt"))
        );
    }

    #[test]
    fn test_select_prefers_vtt_within_language() {
        let languages = vec!["en".to_string()];
        let files = vec![
            PathBuf::from("/t/subtitle.en.srt"),
            PathBuf::from("/t/subtitle.en.vtt"),
        ];
        assert_eq!(
            select_subtitle_file(&files, &languages),
            Some(PathBuf::from("/t/subtitle.en.vtt"))
        );
    }

    #[test]
    fn test_select_unknown_language_ranks_last() {
        let languages = vec!["en".to_string()];
        let files = vec![
            PathBuf::from("/t/subtitle.xx.vtt"),
            PathBuf::from("/t/subtitle.en.srt"),
            PathBuf::from("/t/notes.txt"),
        ];
        assert_eq!(
            select_subtitle_file(&files, &languages),
            Some(PathBuf::from("/t/subtitle.en.srt"))
        );
        assert_eq!(select_subtitle_file(&[PathBuf::from("/t/notes.txt")], &languages), None);
    }

    #[tokio::test]
    async fn test_english_only_subtitles_selected() {
        let root = tempfile::tempdir().unwrap();
        let subs = FakeSubtitles {
            files: vec![(
                "subtitle.en.vtt",
                "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.000\n<c>Hello</c> there\n",
            )],
            fail: false,
        };
        let (acquirer, transcriber) = acquirer(subs, false, root.path());

        let unit = acquirer.acquire(URL, true).await.unwrap();

        assert_eq!(unit.origin(), &ContentOrigin::Subtitles);
        assert_eq!(unit.text(), "Hello there");
        assert_eq!(unit.source_url(), URL);
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_no_subtitles_without_transcription_fails() {
        let root = tempfile::tempdir().unwrap();
        let subs = FakeSubtitles { files: vec![], fail: false };
        let (acquirer, transcriber) = acquirer(subs, false, root.path());

        let err = acquirer.acquire(URL, false).await.unwrap_err();

        assert!(matches!(err, VidragError::Acquisition(_)));
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_transcription() {
        let root = tempfile::tempdir().unwrap();
        let subs = FakeSubtitles { files: vec![], fail: true };
        let (acquirer, transcriber) = acquirer(subs, false, root.path());
        let (sink, mut rx) = ChannelSink::new();
        let acquirer = acquirer.with_sink(Arc::new(sink));

        let unit = acquirer.acquire(URL, true).await.unwrap();

        assert_eq!(unit.origin(), &ContentOrigin::Transcription);
        assert_eq!(unit.text(), "spoken words");
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);
        assert!(is_empty_dir(root.path()));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events
            .iter()
            .any(|e| matches!(e, StatusEvent::ToolDiagnostic { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, StatusEvent::TranscriptionStarted { .. })));
    }

    #[tokio::test]
    async fn test_empty_subtitles_fall_through() {
        let root = tempfile::tempdir().unwrap();
        let subs = FakeSubtitles {
            files: vec![("subtitle.en.vtt", "WEBVTT\n\n1\n00:00:00.000 --> 00:00:01.000\n")],
            fail: false,
        };
        let (acquirer, _) = acquirer(subs, false, root.path());

        let unit = acquirer.acquire(URL, true).await.unwrap();
        assert_eq!(unit.origin(), &ContentOrigin::Transcription);
    }

    #[tokio::test]
    async fn test_download_failure_is_transcription_error() {
        let root = tempfile::tempdir().unwrap();
        let subs = FakeSubtitles { files: vec![], fail: false };
        let (acquirer, transcriber) = acquirer(subs, true, root.path());

        let err = acquirer.acquire(URL, true).await.unwrap_err();

        match err {
            VidragError::Transcription(msg) => assert!(msg.contains("403")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
        assert!(is_empty_dir(root.path()));
    }

    #[test]
    fn test_origin_tags_round_trip() {
        let origin: ContentOrigin = serde_json::from_str("\"subtitles\"").unwrap();
        assert_eq!(origin, ContentOrigin::Subtitles);

        let other: ContentOrigin = serde_json::from_str("\"\"").unwrap();
        assert_eq!(other, ContentOrigin::Other(String::new()));
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"\"");
    }

    #[test]
    fn test_content_unit_is_sanitized() {
        let unit = ContentUnit::new("WEBVTT\n\n<b>Hi</b>\n", ContentOrigin::Subtitles, URL);
        assert_eq!(unit.text(), "Hi");
    }
}
