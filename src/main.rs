//! Alembic - Validation Error Resolution Service
//!
//! CLI entry point for the Alembic server.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use server::config::LoggingConfig;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod server;
mod websocket;

/// Console logging plus an optional daily log file.
///
/// The returned guard flushes the file writer when dropped.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = if logging.file_enabled {
        std::fs::create_dir_all(&logging.directory).with_context(|| {
            format!("Failed to create log directory {}", logging.directory.display())
        })?;
        let appender = tracing_appender::rolling::daily(&logging.directory, "alembic.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alembic=info,alembic_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Startup hint when the server runs without a `.env` file
fn env_hint(command: Option<&cli::Commands>, env_present: bool) -> Option<&'static str> {
    match command {
        Some(cli::Commands::Serve) if !env_present => {
            Some(".env file not found; settings come from config/ and ALEMBIC_* variables")
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();
    let config = server::load_config().context("Failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;

    if let Some(hint) = env_hint(cli.command.as_ref(), std::path::Path::new(".env").exists()) {
        info!("{hint}");
    }

    cli::run(cli, config).await
}
