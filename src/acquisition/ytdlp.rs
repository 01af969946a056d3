//! yt-dlp wrapper for subtitle and audio downloads.

use super::{AudioDownloader, SubtitleFetcher};
use crate::config::AcquisitionSettings;
use crate::error::{Result, VidragError};
use crate::text::truncate_chars;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Longest tool diagnostic carried in errors and status events.
const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// Runs the `yt-dlp` executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    subtitle_format: String,
    audio_format: String,
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::from_settings(&AcquisitionSettings::default())
    }
}

impl YtDlp {
    pub fn from_settings(settings: &AcquisitionSettings) -> Self {
        Self {
            program: settings.ytdlp_path.clone(),
            subtitle_format: settings.subtitle_format.clone(),
            audio_format: settings.audio_format.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        debug!("Running {} {:?}", self.program, args);

        let result = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match result {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VidragError::ToolNotFound(self.program.clone()))
            }
            Err(e) => Err(VidragError::Acquisition(format!(
                "{} execution failed: {}",
                self.program, e
            ))),
        }
    }
}

/// Diagnostic text of a failed run: stderr, or stdout when stderr is empty.
pub(crate) fn tool_diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let message = match stderr.trim() {
        "" => stdout.trim(),
        s => s,
    };

    if message.is_empty() {
        "unknown error".to_string()
    } else {
        truncate_chars(message, MAX_DIAGNOSTIC_CHARS).to_string()
    }
}

#[async_trait]
impl SubtitleFetcher for YtDlp {
    #[instrument(skip(self, languages, dir))]
    async fn fetch_subtitles(&self, url: &str, languages: &[String], dir: &Path) -> Result<()> {
        let template = dir.join("subtitle.%(ext)s");
        let args = vec![
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            languages.join(","),
            "--skip-download".to_string(),
            "--sub-format".to_string(),
            self.subtitle_format.clone(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            url.to_string(),
        ];

        let output = self.run(&args).await?;

        if !output.status.success() {
            let diagnostic = tool_diagnostic(&output);
            warn!("yt-dlp subtitle request failed: {}", diagnostic);
            return Err(VidragError::Acquisition(format!(
                "Subtitle download failed: {}",
                diagnostic
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioDownloader for YtDlp {
    #[instrument(skip(self, dir))]
    async fn download_audio(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let audio_path = dir.join("audio.m4a");
        info!("Downloading audio from {}", url);

        let args = vec![
            "-f".to_string(),
            self.audio_format.clone(),
            "--no-progress".to_string(),
            "-o".to_string(),
            audio_path.to_string_lossy().to_string(),
            url.to_string(),
        ];

        let output = self.run(&args).await?;

        if !output.status.success() {
            let diagnostic = tool_diagnostic(&output);
            warn!("yt-dlp audio download failed: {}", diagnostic);
            return Err(VidragError::Transcription(format!(
                "Audio download failed. Please check network access or video restrictions.\nDetails: {}",
                diagnostic
            )));
        }

        if !audio_path.exists() {
            return Err(VidragError::Transcription(
                "Audio file not found after download".to_string(),
            ));
        }

        Ok(audio_path)
    }
}
