//! CLI module for Alembic
//!
//! - `serve`: start the HTTP/WebSocket server
//! - `analyze`: resolve one error record from a file or stdin
//! - `patterns`: print pattern statistics

use crate::server::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod analyze;
pub mod patterns;

/// Alembic validation error resolution service
#[derive(Parser, Debug)]
#[command(name = "alembic")]
#[command(about = "Diagnose tabular validation errors and suggest fixes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Resolve one error record (JSON) and print the result
    Analyze {
        /// Read the record from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print pattern statistics (built-in plus pattern file)
    Patterns,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run(config).await,
        Some(Commands::Analyze { file }) => analyze::run(&config, file.as_deref()).await,
        Some(Commands::Patterns) => patterns::run(&config).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_with_file() {
        let cli = Cli::parse_from(["alembic", "analyze", "--file", "record.json"]);
        match cli.command {
            Some(Commands::Analyze { file }) => {
                assert_eq!(file, Some(PathBuf::from("record.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::parse_from(["alembic"]);
        assert!(cli.command.is_none());
    }
}
