//! `alembic patterns`

use crate::server::build_resolver;
use crate::server::config::AppConfig;
use anyhow::{Context, Result};

pub async fn run(config: &AppConfig) -> Result<()> {
    let resolver = build_resolver(config).await;
    let stats = resolver.statistics().await;

    println!("{:<26} {:>8}", "KIND", "ENTRIES");
    for (kind, kind_stats) in &stats {
        println!("{:<26} {:>8}", kind.as_str(), kind_stats.entry_count);
    }
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&stats).context("Failed to serialize statistics")?
    );
    Ok(())
}
