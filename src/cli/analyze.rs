//! `alembic analyze`

use crate::server::build_resolver;
use crate::server::config::AppConfig;
use alembic_core::ErrorRecord;
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

pub async fn run(config: &AppConfig, file: Option<&Path>) -> Result<()> {
    let input = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            input
        }
    };

    let body: Value = serde_json::from_str(&input).context("Input is not valid JSON")?;
    let record = ErrorRecord::from_value(body).context("Invalid error record")?;

    let resolver = build_resolver(config).await;
    let resolution = resolver.resolve(record).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&resolution).context("Failed to serialize resolution")?
    );
    Ok(())
}
