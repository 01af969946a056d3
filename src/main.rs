//! vidrag CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidrag::cli::{commands, Cli, Commands};
use vidrag::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // -v flags override the configured level.
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidrag={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.sessions_dir())?;

    match &cli.command {
        Commands::Ingest {
            url,
            session,
            no_transcription,
            language,
            export,
        } => {
            commands::run_ingest(
                url,
                session.clone(),
                *no_transcription,
                language.as_deref(),
                export.as_deref(),
                settings,
            )
            .await?;
        }

        Commands::Add {
            session,
            url,
            no_transcription,
            language,
        } => {
            commands::run_add(session, url, *no_transcription, language.as_deref(), settings).await?;
        }

        Commands::Ask {
            session,
            question,
            sources,
        } => {
            commands::run_ask(session, question, *sources, settings).await?;
        }

        Commands::Sessions { action } => {
            commands::run_sessions(action, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
