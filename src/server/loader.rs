//! Configuration loading
//!
//! Embedded defaults, then optional files, then environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let profile = std::env::var("ALEMBIC_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{profile}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // ALEMBIC_SERVER__PORT: single "_" after the prefix, "__" between keys.
        .add_source(
            Environment::with_prefix("ALEMBIC")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_deserialize() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.engine.confidence_threshold, 0.5);
        assert_eq!(
            config.models.patterns_path.as_deref(),
            Some(std::path::Path::new("models/suggestion_patterns.json"))
        );
        assert!(config.logging.file_enabled);
    }
}
