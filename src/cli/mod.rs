//! CLI module for vidrag.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{ConsoleSink, Output};

use clap::{Parser, Subcommand};

/// vidrag - Summarize YouTube videos and ask questions about them
///
/// Ingests a video's subtitles (or transcribed audio), writes a summary, and
/// keeps a session you can extend with more videos and query.
#[derive(Parser, Debug)]
#[command(name = "vidrag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Summarize a video and save it as a new session
    Ingest {
        /// YouTube URL or video id
        url: String,

        /// Session name (defaults to the video id)
        #[arg(short, long)]
        session: Option<String>,

        /// Fail instead of transcribing audio when no subtitles exist
        #[arg(long)]
        no_transcription: bool,

        /// Summary language (zh or en)
        #[arg(short, long)]
        language: Option<String>,

        /// Also write the summary and extracted text as .txt files into this directory
        #[arg(short, long)]
        export: Option<String>,
    },

    /// Add another video to an existing session
    Add {
        /// Session to extend
        session: String,

        /// YouTube URL or video id
        url: String,

        /// Fail instead of transcribing audio when no subtitles exist
        #[arg(long)]
        no_transcription: bool,

        /// Summary language (zh or en); defaults to the session's language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Ask a question about the videos of a session
    Ask {
        /// Session to query
        session: String,

        /// The question to ask
        question: String,

        /// Print the retrieved context chunks
        #[arg(long)]
        sources: bool,
    },

    /// Manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List saved sessions, newest first
    List,

    /// Show a session's videos, summary and chat history
    Show {
        session: String,
    },

    /// Delete a session
    Delete {
        session: String,
    },

    /// Write a Markdown analysis report of a session
    Report {
        session: String,

        /// Report language (zh or en); defaults to the session's language
        #[arg(short, long)]
        language: Option<String>,

        /// Output file (default: analysis/<session>_analysis.md)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
