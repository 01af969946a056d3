//! CLI output formatting utilities.

use crate::events::{StatusEvent, StatusSink};
use crate::text::truncate_chars;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one session of a listing.
    pub fn session_info(id: &str, created: &str, videos: usize, turns: usize) {
        println!(
            "  {} {} ({}, {} videos, {} questions)",
            style("*").cyan(),
            style(id).bold(),
            style(created).dim(),
            videos,
            turns
        );
    }

    /// Print a retrieved context chunk.
    pub fn source(url: &str, score: f32, content: &str) {
        println!("\n{} {} (score: {:.2})", style(">>").green(), style(url).bold(), score);
        println!("   {}", content_preview(content, 200));
    }

    /// Print a block of text under a horizontal rule.
    pub fn block(text: &str) {
        println!("{}", style("-".repeat(50)).dim());
        println!("{}", text);
        println!("{}", style("-".repeat(50)).dim());
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Shows pipeline status events as the spinner message.
#[derive(Clone)]
pub struct ConsoleSink {
    spinner: ProgressBar,
}

impl ConsoleSink {
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

impl StatusSink for ConsoleSink {
    fn emit(&self, event: &StatusEvent) {
        self.spinner.set_message(event.to_string());
    }
}

/// Single-line preview of `content`, at most `max_chars` characters plus an ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    let preview = truncate_chars(&content, max_chars);
    if preview.len() == content.len() {
        content
    } else {
        format!("{}...", preview)
    }
}
